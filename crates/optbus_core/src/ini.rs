//! Text forms of values and the `key=value` batch format.
//!
//! A batch is a sequence of lines. Spaces in keys are dropped, the value
//! runs to the end of the line untouched, lines without `=` are ignored and
//! the final line needs no terminator.

use crate::error::{OptError, OptResult};
use crate::types::{Value, ValueType};

/// Splits batch text into `(key, value)` pairs, in order.
pub fn parse_kv(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;

    for c in text.chars() {
        if in_value {
            if c == '\r' || c == '\n' {
                if !key.is_empty() {
                    pairs.push((std::mem::take(&mut key), std::mem::take(&mut value)));
                }
                key.clear();
                value.clear();
                in_value = false;
            } else {
                value.push(c);
            }
        } else if c == '=' {
            in_value = true;
        } else if c == '\r' || c == '\n' {
            // line without '='
            key.clear();
        } else if c != ' ' {
            key.push(c);
        }
    }

    if in_value && !key.is_empty() {
        pairs.push((key, value));
    }
    pairs
}

/// Parses the text form of a value for an entry of type `value_type`.
pub fn parse_value(value_type: ValueType, text: &str) -> OptResult<Value> {
    match value_type {
        ValueType::Int => parse_int(text).map(Value::Int),
        ValueType::Bool => match text.trim() {
            "true" => Ok(Value::Int(1)),
            "false" => Ok(Value::Int(0)),
            other => parse_int(other).map(Value::Int),
        },
        ValueType::Event => match text.trim() {
            "" => Ok(Value::Int(0)),
            other => parse_int(other).map(Value::Int),
        },
        ValueType::Str => Ok(Value::Str(text.to_string())),
        ValueType::Blob => decode_hex(text.trim()).map(Value::Blob),
        ValueType::Pointer => {
            let digits = text.trim();
            let digits = digits
                .strip_prefix("0x")
                .or_else(|| digits.strip_prefix("0X"))
                .unwrap_or(digits);
            usize::from_str_radix(digits, 16)
                .map(Value::Pointer)
                .map_err(|e| OptError::bad_parameter(format!("bad pointer {text:?}: {e}")))
        }
        ValueType::Array => Ok(Value::Array(if text.is_empty() {
            Vec::new()
        } else {
            text.split(';').map(str::to_string).collect()
        })),
    }
}

fn parse_int(text: &str) -> OptResult<i64> {
    let trimmed = text.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => trimmed.parse::<i64>(),
    };
    parsed.map_err(|e| OptError::bad_parameter(format!("bad integer {text:?}: {e}")))
}

/// Renders a value in its canonical text form.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Str(s) => s.clone(),
        Value::Blob(bytes) => encode_hex(bytes),
        Value::Pointer(p) => format!("{p:#x}"),
        Value::Array(items) => items.join(";"),
    }
}

/// Lowercase hex encoding.
pub fn encode_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(char::from(DIGITS[usize::from(b >> 4)]));
        out.push(char::from(DIGITS[usize::from(b & 0x0f)]));
    }
    out
}

/// Decodes hex text of either case.
pub fn decode_hex(text: &str) -> OptResult<Vec<u8>> {
    if text.len() % 2 != 0 {
        return Err(OptError::bad_parameter(format!(
            "hex data has odd length {}",
            text.len()
        )));
    }
    text.as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = hex_digit(pair[0]);
            let lo = hex_digit(pair[1]);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok((hi << 4) | lo),
                _ => Err(OptError::bad_parameter(format!(
                    "invalid hex digits {:?}",
                    String::from_utf8_lossy(pair)
                ))),
            }
        })
        .collect()
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
