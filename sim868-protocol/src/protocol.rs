use std::fmt;

use crate::error::{ModemError, Result};

/// Line terminator between response lines.
pub const LINE_END: &str = "\r\n";
/// Terminal marker of a successful response.
pub const OK: &[u8] = b"OK\r\n";
/// Terminal marker of a failed response.
pub const ERROR: &[u8] = b"ERROR\r\n";
/// Interactive prompt, the modem waits for a payload.
pub const PROMPT: &[u8] = b"> ";
/// Ctrl-Z. Ends the payload typed after a prompt and submits it.
pub const SUB: u8 = 0x1A;

/// Prefix of extended (`AT+`) commands.
pub const COMMAND_PREFIX: &str = "AT+";
/// Command line terminator.
pub const COMMAND_END: &str = "\r";

/// Extended result codes that end a response with a numeric error.
const EXTENDED_ERRORS: [&[u8]; 2] = [b"+CME ERROR:", b"+CMS ERROR:"];

/// Build the exact text to transmit for a command body.
///
/// `AT+<body>\r` unless `raw`, in which case the body goes out untouched.
pub fn format_command(body: &str, raw: bool) -> String {
    if raw {
        body.to_string()
    } else {
        format!("{COMMAND_PREFIX}{body}{COMMAND_END}")
    }
}

/// Completion state of a response being accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Accumulating,
    CompleteOk,
    CompleteError,
    CompletePrompt,
}

impl FrameState {
    /// Classify a buffer by the terminal marker it ends with.
    pub fn classify(buf: &[u8]) -> Self {
        if buf.ends_with(OK) {
            Self::CompleteOk
        } else if buf.ends_with(ERROR) || ends_with_extended_error(buf) {
            Self::CompleteError
        } else if buf.ends_with(PROMPT) {
            Self::CompletePrompt
        } else {
            Self::Accumulating
        }
    }

    pub fn is_complete(self) -> bool {
        self != Self::Accumulating
    }

    /// The status a completed frame terminates with.
    pub fn status(self) -> Option<Status> {
        match self {
            Self::Accumulating => None,
            Self::CompleteOk => Some(Status::Ok),
            Self::CompleteError => Some(Status::Error),
            Self::CompletePrompt => Some(Status::Prompt),
        }
    }
}

fn ends_with_extended_error(buf: &[u8]) -> bool {
    let Some(body) = buf.strip_suffix(LINE_END.as_bytes()) else {
        return false;
    };
    let start = body
        .windows(2)
        .rposition(|w| w == LINE_END.as_bytes())
        .map_or(0, |pos| pos + 2);
    EXTENDED_ERRORS
        .iter()
        .any(|prefix| body[start..].starts_with(prefix))
}

/// A complete response as read from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub bytes: Vec<u8>,
    pub status: Status,
}

/// Byte-at-a-time accumulator for one response.
///
/// Completion is tested after every byte so a marker is recognised the moment
/// it arrives, even when more data follows in the same read.
#[derive(Debug)]
pub struct FrameAccumulator {
    buf: Vec<u8>,
    limit: usize,
    state: FrameState,
}

impl FrameAccumulator {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(limit.min(256)),
            limit,
            state: FrameState::Accumulating,
        }
    }

    /// Append one byte and return the new state.
    pub fn push(&mut self, byte: u8) -> FrameState {
        if !self.state.is_complete() {
            self.buf.push(byte);
            self.state = FrameState::classify(&self.buf);
        }
        self.state
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// True once the byte budget is spent without reaching a marker.
    pub fn is_full(&self) -> bool {
        !self.state.is_complete() && self.buf.len() >= self.limit
    }

    /// Finish the frame. Returns `None` while still accumulating.
    pub fn into_frame(self) -> Option<RawFrame> {
        let status = self.state.status()?;
        Some(RawFrame {
            bytes: self.buf,
            status,
        })
    }
}

/// Final status line of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    Prompt,
}

impl Status {
    /// Parse a status line (without its terminator).
    pub fn from_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        match trimmed {
            "OK" => Some(Self::Ok),
            "ERROR" => Some(Self::Error),
            ">" => Some(Self::Prompt),
            _ if EXTENDED_ERRORS
                .iter()
                .any(|prefix| trimmed.as_bytes().starts_with(prefix)) =>
            {
                Some(Self::Error)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Error => write!(f, "ERROR"),
            Self::Prompt => write!(f, "> "),
        }
    }
}

/// A response split into its lines and trailing status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    /// Response lines in order, echo removed.
    pub lines: Vec<String>,
    pub status: Status,
    /// The status line as received, kept for diagnostics.
    pub status_line: String,
}

impl Tokens {
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    pub fn first(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }
}

/// Split a complete response into lines and status.
///
/// Empty segments are dropped, the last segment is the status, and when the
/// modem echoes commands one more leading line (the echo) is removed.
pub fn tokenize(frame: &str, echo: bool) -> Result<Tokens> {
    let mut lines: Vec<String> = frame
        .split(LINE_END)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();

    let status_line = lines
        .pop()
        .ok_or_else(|| ModemError::decode("response", "empty frame"))?;
    let status = Status::from_line(&status_line).ok_or_else(|| {
        ModemError::decode("response", format!("unknown status line {status_line:?}"))
    })?;

    if echo && !lines.is_empty() {
        lines.remove(0);
    }

    Ok(Tokens {
        lines,
        status,
        status_line,
    })
}
