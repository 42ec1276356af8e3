use std::fmt;

use crate::protocol::{self, SUB};

/// Command bodies, without the `AT+` prefix.
pub mod cmd {
    /// GNSS power control.
    pub const GNSS_POWER: &str = "CGNSPWR";
    /// GNSS navigation information.
    pub const GNSS_INFO: &str = "CGNSINF";
    /// SMS message format (0 = PDU, 1 = text).
    pub const SMS_FORMAT: &str = "CMGF";
    /// Preferred SMS message storage.
    pub const SMS_STORAGE: &str = "CPMS";
    /// Read SMS message.
    pub const SMS_READ: &str = "CMGR";
    /// Delete SMS message.
    pub const SMS_DELETE: &str = "CMGD";
    /// Send SMS message.
    pub const SMS_SEND: &str = "CMGS";
}

/// An AT command to send to the modem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bare `AT`, answered with `OK` by any powered modem.
    Attention,
    /// Turn the GNSS engine on or off.
    GnssPower(bool),
    /// Query the current GNSS fix.
    GnssInfo,
    /// Switch SMS handling to text mode.
    TextMode,
    /// Select the SMS storage; the reply carries its counters.
    SelectStorage(String),
    /// Read the message stored at a 1-based index.
    ReadSms(usize),
    /// Delete the message stored at a 1-based index.
    DeleteSms(usize),
    /// Start sending a text message; the modem answers with a prompt.
    SendSms(String),
    /// Message text typed after the prompt, terminated by Ctrl-Z.
    SmsBody(String),
    /// Anything else, passed through as given.
    Custom { body: String, raw: bool },
}

impl Command {
    /// Command body as it follows `AT+`, or the full payload for raw commands.
    pub fn body(&self) -> String {
        match self {
            Command::Attention => "AT\r".to_string(),
            Command::GnssPower(on) => format!("{}={}", cmd::GNSS_POWER, u8::from(*on)),
            Command::GnssInfo => cmd::GNSS_INFO.to_string(),
            Command::TextMode => format!("{}=1", cmd::SMS_FORMAT),
            Command::SelectStorage(source) => {
                format!("{}=\"{}\"", cmd::SMS_STORAGE, source.to_uppercase())
            }
            Command::ReadSms(nth) => format!("{}={nth}", cmd::SMS_READ),
            Command::DeleteSms(nth) => format!("{}={nth}", cmd::SMS_DELETE),
            Command::SendSms(number) => format!("{}=\"{number}\"", cmd::SMS_SEND),
            Command::SmsBody(text) => format!("{text}{}", char::from(SUB)),
            Command::Custom { body, .. } => body.clone(),
        }
    }

    /// Raw commands are written verbatim, without prefix or terminator.
    pub fn is_raw(&self) -> bool {
        match self {
            Command::Attention | Command::SmsBody(_) => true,
            Command::Custom { raw, .. } => *raw,
            _ => false,
        }
    }

    /// The exact text to transmit.
    pub fn to_wire(&self) -> String {
        protocol::format_command(&self.body(), self.is_raw())
    }
}

impl fmt::Display for Command {
    /// Short name used in logs and error context. Message bodies are not shown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Attention => write!(f, "AT"),
            Command::SmsBody(text) => write!(f, "SMS body ({} chars)", text.chars().count()),
            Command::Custom { body, raw: true } => write!(f, "{}", body.escape_debug()),
            _ => write!(f, "AT+{}", self.body()),
        }
    }
}
