//! Handshake lines and the prompt.

use crate::error::{ProtocolError, ProtocolResult};
use crate::status::Status;
use crate::CRLF;
use std::fmt;

/// Prompt sent before a client has identified itself.
pub const BARE_PROMPT: &str = "$ ";

/// Which of the two sockets of a client this connection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    /// `o`: requests and replies.
    Command,
    /// `w`: server-pushed watch notifications.
    Watch,
}

impl ChannelMode {
    /// The mode letter used on the wire.
    pub fn letter(self) -> char {
        match self {
            ChannelMode::Command => 'o',
            ChannelMode::Watch => 'w',
        }
    }

    /// Parses a mode letter.
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "o" => Some(ChannelMode::Command),
            "w" => Some(ChannelMode::Watch),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// `hey <mode> <client> <hash> <user> <password>`.
#[derive(Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Channel this socket becomes.
    pub mode: ChannelMode,
    /// Client name; selects `b:/sys/admin/<client>/enable`.
    pub client: String,
    /// Opaque identity shared by the two sockets of one client.
    pub connection_hash: String,
    /// User name; selects `s:/sys/usr/<user>/passwd`.
    pub user: String,
    /// Password.
    pub password: String,
}

impl Handshake {
    /// Renders the handshake line, CRLF included.
    pub fn to_line(&self) -> String {
        format!(
            "hey {} {} {} {} {}{CRLF}",
            self.mode, self.client, self.connection_hash, self.user, self.password
        )
    }
}

impl fmt::Debug for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("mode", &self.mode)
            .field("client", &self.client)
            .field("connection_hash", &self.connection_hash)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// What a not-yet-identified connection sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Greeting {
    /// Blank line; answered with the bare prompt.
    Empty,
    /// `help`.
    Help,
    /// A well-formed handshake.
    Hey(Handshake),
    /// Anything else, holding the first word.
    Unknown(String),
}

impl Greeting {
    /// Classifies one frame received before the handshake.
    pub fn parse(text: &str) -> Self {
        let mut words = text.split_whitespace();
        let Some(first) = words.next() else {
            return Greeting::Empty;
        };
        if first.starts_with("help") {
            return Greeting::Help;
        }
        if first != "hey" {
            return Greeting::Unknown(first.to_string());
        }
        match parse_hey_args(&words.collect::<Vec<_>>()) {
            Ok(handshake) => Greeting::Hey(handshake),
            Err(_) => Greeting::Unknown(first.to_string()),
        }
    }
}

fn parse_hey_args(args: &[&str]) -> ProtocolResult<Handshake> {
    let [mode, client, hash, user, password, ..] = args else {
        return Err(ProtocolError::invalid_handshake(format!(
            "expected 5 arguments, got {}",
            args.len()
        )));
    };
    let mode = ChannelMode::from_letter(mode)
        .ok_or_else(|| ProtocolError::invalid_handshake(format!("unknown mode {mode:?}")))?;
    Ok(Handshake {
        mode,
        client: client.to_string(),
        connection_hash: hash.to_string(),
        user: user.to_string(),
        password: password.to_string(),
    })
}

/// The prompt echoed after every reply to `client`.
pub fn prompt_for(client: &str) -> String {
    format!("\r\n({client}){BARE_PROMPT}")
}

/// Successful handshake reply: status line, prompt length, prompt.
pub fn format_handshake_ack(prompt: &str) -> String {
    format!("{}{}{}", Status::ok().to_line(), prompt.len(), prompt)
}

/// Reply to an unrecognised pre-handshake command.
pub fn format_bad_greeting(command: &str) -> String {
    format!("{command}: bad command{CRLF}{BARE_PROMPT}")
}

/// Parses a handshake reply and returns the prompt length.
pub fn parse_handshake_ack(text: &str) -> ProtocolResult<usize> {
    let (status, rest) = text
        .split_once(CRLF)
        .ok_or_else(|| ProtocolError::invalid_handshake("reply has no status line"))?;
    if !status.starts_with('0') {
        return Err(ProtocolError::invalid_handshake(format!(
            "server refused: {status}"
        )));
    }
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    let len: usize = digits
        .parse()
        .map_err(|_| ProtocolError::invalid_handshake("missing prompt length"))?;
    let prompt = &rest[digits.len()..];
    if prompt.len() != len {
        return Err(ProtocolError::invalid_handshake(format!(
            "prompt length {} does not match announced {}",
            prompt.len(),
            len
        )));
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Handshake {
        Handshake {
            mode: ChannelMode::Watch,
            client: "tool".into(),
            connection_hash: "abc123".into(),
            user: "admin".into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn handshake_line_parses_back() {
        let line = sample().to_line();
        assert_eq!(line, "hey w tool abc123 admin secret\r\n");
        assert_eq!(Greeting::parse(&line), Greeting::Hey(sample()));
    }

    #[test]
    fn short_or_odd_handshakes_are_unknown() {
        assert_eq!(
            Greeting::parse("hey o tool abc admin"),
            Greeting::Unknown("hey".into())
        );
        assert_eq!(
            Greeting::parse("hey x tool abc admin pw"),
            Greeting::Unknown("hey".into())
        );
        assert_eq!(Greeting::parse("  \r\n"), Greeting::Empty);
        assert_eq!(Greeting::parse("help"), Greeting::Help);
        assert_eq!(Greeting::parse("og s:/x"), Greeting::Unknown("og".into()));
    }

    #[test]
    fn debug_hides_password() {
        assert!(!format!("{:?}", sample()).contains("secret"));
    }

    #[test]
    fn ack_round_trip() {
        let prompt = prompt_for("tool");
        assert_eq!(prompt, "\r\n(tool)$ ");
        let ack = format_handshake_ack(&prompt);
        assert_eq!(ack, "0 OK\r\n10\r\n(tool)$ ");
        assert_eq!(parse_handshake_ack(&ack).unwrap(), 10);
    }

    #[test]
    fn ack_rejects_bad_replies() {
        assert!(parse_handshake_ack("1 NG\r\n").is_err());
        assert!(parse_handshake_ack("0 OK\r\n99\r\n(x)$ ").is_err());
        assert!(parse_handshake_ack("garbage").is_err());
    }

    #[test]
    fn bad_greeting_reply() {
        assert_eq!(format_bad_greeting("og"), "og: bad command\r\n$ ");
    }
}
