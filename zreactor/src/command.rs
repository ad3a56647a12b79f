//! Control commands carried over the control channel.
//!
//! Each command is one text frame: a header token, then for `MSG` a single
//! space and the payload.
//!
//! ```text
//! MSG <payload>   forward payload through the single registered socket
//! KILL            stop the reactor loop
//! PASS            no-op, wakes a blocked poll
//! ```

use std::fmt;

use crate::error::{Error, Result};

/// A command for the reactor thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Send the payload through the single registered socket
    Send(String),
    /// Stop the loop and release every socket
    Kill,
    /// Wake the loop so it re-reads its socket set
    Noop,
}

impl ControlCommand {
    /// Header of [`ControlCommand::Send`]
    pub const SEND_HEADER: &'static str = "MSG";
    /// Header of [`ControlCommand::Kill`]
    pub const KILL_HEADER: &'static str = "KILL";
    /// Header of [`ControlCommand::Noop`]
    pub const NOOP_HEADER: &'static str = "PASS";

    /// Header token of this command.
    pub fn header(&self) -> &'static str {
        match self {
            Self::Send(_) => Self::SEND_HEADER,
            Self::Kill => Self::KILL_HEADER,
            Self::Noop => Self::NOOP_HEADER,
        }
    }

    /// Encode as a single text frame.
    pub fn encode(&self) -> String {
        match self {
            Self::Send(payload) => format!("{} {}", Self::SEND_HEADER, payload),
            other => other.header().to_string(),
        }
    }

    /// Decode a text frame.
    ///
    /// Everything after the first space of a `MSG` frame is the payload,
    /// spaces included. A bare `MSG` carries an empty payload.
    pub fn decode(frame: &str) -> Result<Self> {
        let (header, payload) = match frame.split_once(' ') {
            Some((header, payload)) => (header, payload),
            None => (frame, ""),
        };

        match header {
            Self::SEND_HEADER => Ok(Self::Send(payload.to_string())),
            Self::KILL_HEADER => Ok(Self::Kill),
            Self::NOOP_HEADER => Ok(Self::Noop),
            other => Err(Error::unknown_command(other)),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(ControlCommand::Send("hello".into()).encode(), "MSG hello");
        assert_eq!(ControlCommand::Send(String::new()).encode(), "MSG ");
        assert_eq!(ControlCommand::Kill.encode(), "KILL");
        assert_eq!(ControlCommand::Noop.encode(), "PASS");
    }

    #[test]
    fn test_decode_keeps_payload_spaces() {
        let cmd = ControlCommand::decode("MSG 1700000000.5 myval1 NUMERIC 42").unwrap();
        assert_eq!(cmd, ControlCommand::Send("1700000000.5 myval1 NUMERIC 42".into()));

        let cmd = ControlCommand::decode("MSG  leading").unwrap();
        assert_eq!(cmd, ControlCommand::Send(" leading".into()));
    }

    #[test]
    fn test_decode_empty_payload() {
        assert_eq!(ControlCommand::decode("MSG ").unwrap(), ControlCommand::Send(String::new()));
        assert_eq!(ControlCommand::decode("MSG").unwrap(), ControlCommand::Send(String::new()));
    }

    #[test]
    fn test_decode_control_words() {
        assert_eq!(ControlCommand::decode("KILL").unwrap(), ControlCommand::Kill);
        assert_eq!(ControlCommand::decode("PASS").unwrap(), ControlCommand::Noop);
    }

    #[test]
    fn test_decode_unknown_header() {
        assert!(matches!(
            ControlCommand::decode("HELLO world"),
            Err(Error::UnknownCommand(h)) if h == "HELLO"
        ));
        assert!(matches!(ControlCommand::decode(""), Err(Error::UnknownCommand(_))));
        assert!(matches!(ControlCommand::decode("msg x"), Err(Error::UnknownCommand(_))));
    }

    #[test]
    fn test_payload_that_looks_like_a_command() {
        let cmd = ControlCommand::Send("KILL".into());
        assert_eq!(ControlCommand::decode(&cmd.encode()).unwrap(), cmd);
    }
}
