//! Command channel requests.

use crate::CRLF;

/// Text returned by `help` on the command channel.
pub const HELP_TEXT: &str =
    "help(), hey(mode<o|w>, client, connhash, user, pass), bye(), wa(opt), wd(opt), os(ini), og(opt)";

/// One request on the command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `wa <path>`: forward sets of `path` to the watch channel.
    WatchAdd(String),
    /// `wd <path>`: stop forwarding.
    WatchDelete(String),
    /// `os <ini>`: apply `key=value` lines in one session.
    Set(String),
    /// `og <path>`: read one entry.
    Get(String),
    /// `bye`: close the connection.
    Bye,
    /// `help`.
    Help,
    /// Anything else.
    Unknown(String),
}

impl Command {
    /// Parses one frame.
    pub fn parse(text: &str) -> Self {
        let text = text.trim_start();
        let argument = |prefix: &str| text.strip_prefix(prefix).map(|rest| rest.trim().to_string());

        if let Some(path) = argument("wa ") {
            Command::WatchAdd(path)
        } else if let Some(path) = argument("wd ") {
            Command::WatchDelete(path)
        } else if let Some(ini) = text.strip_prefix("os ") {
            // Values run to end of line, so only the line ends are trimmed.
            Command::Set(ini.trim_end_matches(['\r', '\n', ' ']).to_string())
        } else if let Some(path) = argument("og ") {
            Command::Get(path)
        } else if text.starts_with("bye") {
            Command::Bye
        } else if text.starts_with("help") {
            Command::Help
        } else {
            Command::Unknown(text.trim().to_string())
        }
    }

    /// Renders the request, CRLF included.
    pub fn to_line(&self) -> String {
        match self {
            Command::WatchAdd(path) => format!("wa {path}{CRLF}"),
            Command::WatchDelete(path) => format!("wd {path}{CRLF}"),
            Command::Set(ini) => format!("os {ini}{CRLF}"),
            Command::Get(path) => format!("og {path}{CRLF}"),
            Command::Bye => format!("bye{CRLF}"),
            Command::Help => format!("help{CRLF}"),
            Command::Unknown(text) => format!("{text}{CRLF}"),
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::WatchAdd(_) => "wa",
            Command::WatchDelete(_) => "wd",
            Command::Set(_) => "os",
            Command::Get(_) => "og",
            Command::Bye => "bye",
            Command::Help => "help",
            Command::Unknown(_) => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_command() {
        assert_eq!(Command::parse("wa s:/x\r\n"), Command::WatchAdd("s:/x".into()));
        assert_eq!(Command::parse("wd s:/x"), Command::WatchDelete("s:/x".into()));
        assert_eq!(Command::parse("og i:/n\r\n"), Command::Get("i:/n".into()));
        assert_eq!(Command::parse("bye\r\n"), Command::Bye);
        assert_eq!(Command::parse("help"), Command::Help);
        assert_eq!(Command::parse("zz top"), Command::Unknown("zz top".into()));
    }

    #[test]
    fn set_keeps_every_line() {
        let cmd = Command::parse("os i:/a=1\ns:/b=two words\r\n");
        assert_eq!(cmd, Command::Set("i:/a=1\ns:/b=two words".into()));
    }

    #[test]
    fn to_line_parses_back() {
        for cmd in [
            Command::WatchAdd("s:/x".into()),
            Command::Set("i:/a=1".into()),
            Command::Get("i:/a".into()),
            Command::Bye,
            Command::Help,
        ] {
            assert_eq!(Command::parse(&cmd.to_line()), cmd);
        }
    }

    #[test]
    fn prefix_needs_the_space() {
        assert_eq!(Command::parse("wax"), Command::Unknown("wax".into()));
        assert_eq!(Command::parse("og"), Command::Unknown("og".into()));
    }
}
