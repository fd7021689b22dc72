//! Core value and identifier types.

use crate::error::{OptError, OptResult};
use std::fmt;

/// Type of an entry, taken from the one-character tag in front of its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// `a:` list of strings.
    Array,
    /// `b:` boolean stored as an integer.
    Bool,
    /// `d:` binary data.
    Blob,
    /// `e:` event; the value is the number of times it fired.
    Event,
    /// `i:` signed integer.
    Int,
    /// `s:` string.
    Str,
    /// `p:` opaque address-sized handle.
    Pointer,
}

impl ValueType {
    /// Maps a tag character to its type.
    #[must_use]
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'a' => Some(Self::Array),
            'b' => Some(Self::Bool),
            'd' => Some(Self::Blob),
            'e' => Some(Self::Event),
            'i' => Some(Self::Int),
            's' => Some(Self::Str),
            'p' => Some(Self::Pointer),
            _ => None,
        }
    }

    /// Returns the tag character.
    #[must_use]
    pub fn tag(self) -> char {
        match self {
            Self::Array => 'a',
            Self::Bool => 'b',
            Self::Blob => 'd',
            Self::Event => 'e',
            Self::Int => 'i',
            Self::Str => 's',
            Self::Pointer => 'p',
        }
    }

    /// Parses the type out of a full path such as `s:/net/addr`.
    pub fn from_path(path: &str) -> OptResult<Self> {
        let bytes = path.as_bytes();
        if bytes.len() < 3 || bytes[1] != b':' || bytes[2] != b'/' {
            return Err(OptError::bad_type(format!(
                "path must look like '<tag>:/<name>': {path:?}"
            )));
        }
        Self::from_tag(char::from(bytes[0]))
            .ok_or_else(|| OptError::bad_type(format!("unknown type tag in {path:?}")))
    }

    /// Returns the value a freshly registered entry holds.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::Int | Self::Bool | Self::Event => Value::Int(0),
            Self::Str => Value::Str(String::new()),
            Self::Blob => Value::Blob(Vec::new()),
            Self::Pointer => Value::Pointer(0),
            Self::Array => Value::Array(Vec::new()),
        }
    }

    /// Returns true if a value of this shape may be stored in the entry.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Int | Self::Bool | Self::Event, Value::Int(_))
                | (Self::Str, Value::Str(_))
                | (Self::Blob, Value::Blob(_))
                | (Self::Pointer, Value::Pointer(_))
                | (Self::Array, Value::Array(_))
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Array => "array",
            Self::Bool => "bool",
            Self::Blob => "blob",
            Self::Event => "event",
            Self::Int => "int",
            Self::Str => "string",
            Self::Pointer => "pointer",
        };
        f.write_str(name)
    }
}

/// A value held by an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Integer; also used by bool and event entries.
    Int(i64),
    /// UTF-8 string.
    Str(String),
    /// Raw bytes.
    Blob(Vec<u8>),
    /// Opaque handle.
    Pointer(usize),
    /// List of strings.
    Array(Vec<String>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Blob(_) => "blob",
            Value::Pointer(_) => "pointer",
            Value::Array(_) => "array",
        }
    }

    /// Returns the integer, if this is an integer.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Array(v)
    }
}

/// Capability bits of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attributes(u32);

impl Attributes {
    /// No capabilities.
    pub const NONE: Self = Self(0);
    /// The value may be set more than once.
    pub const CAN_SET: Self = Self(0x1);
    /// The value may be read.
    pub const CAN_GET: Self = Self(0x2);
    /// Watches may attach to the entry.
    pub const CAN_WATCH: Self = Self(0x4);
    /// A second registration is refused even with identical hooks.
    pub const REGISTER_ONCE: Self = Self(0x8);

    /// Returns the raw bits.
    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Builds attributes from raw bits, dropping unknown ones.
    #[must_use]
    pub fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & 0xF)
    }

    /// Returns true if every bit of `other` is set.
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Self::CAN_SET | Self::CAN_GET | Self::CAN_WATCH
    }
}

impl std::ops::BitOr for Attributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Attributes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Identifier of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u32);

impl SessionId {
    /// Mutations outside any session.
    pub const NONE: Self = Self(0);

    /// Creates a session id from its raw value.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns true unless this is the sentinel.
    #[must_use]
    pub fn is_some(self) -> bool {
        self.0 != 0
    }

    /// Returns the id following this one, skipping zero on wrap.
    #[must_use]
    pub fn next(self) -> Self {
        match self.0.wrapping_add(1) {
            0 => Self(1),
            n => Self(n),
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a watch runs before or after the new value is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchPhase {
    /// Runs while the new value is still pending.
    Before,
    /// Runs once the value has been applied.
    After,
}
