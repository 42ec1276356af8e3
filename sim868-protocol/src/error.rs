use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModemError>;

#[derive(Debug, Error)]
pub enum ModemError {
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("power key error: {0}")]
    Power(String),

    #[error("the modem is not powered on")]
    NotPowered,

    #[error("{command} failed: {frame:?}")]
    CommandFailed { command: String, frame: String },

    #[error("no `> ` prompt after {command}: {frame:?}")]
    PromptNotReceived { command: String, frame: String },

    #[error("message #{index} is out of range (capacity {capacity})")]
    IndexOutOfRange { index: usize, capacity: u32 },

    #[error("cannot decode {context}: {detail}")]
    Decode { context: String, detail: String },

    #[error("timeout waiting for {command} ({received} bytes received)")]
    Timeout { command: String, received: usize },

    #[error("response to {command} exceeded {limit} bytes")]
    FrameTooLarge { command: String, limit: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("{text:?} cannot be encoded as {encoding}")]
    Unencodable { encoding: &'static str, text: String },
}

impl ModemError {
    pub(crate) fn decode(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Decode {
            context: context.into(),
            detail: detail.into(),
        }
    }
}
