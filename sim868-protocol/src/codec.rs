use std::fmt;

use crate::error::{ModemError, Result};

/// Character encoding used for text exchanged with the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1, one byte per character.
    Latin1,
}

impl TextEncoding {
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "latin-1",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How command text and responses cross the serial line.
///
/// Chosen once per session. `Raw` hands responses back as bytes from
/// [`Modem::at`](crate::Modem::at); `Text` decodes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Raw,
    Text(TextEncoding),
}

impl Default for Codec {
    fn default() -> Self {
        Self::Text(TextEncoding::Utf8)
    }
}

/// A response as handed back by the passthrough API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Bytes(Vec<u8>),
    Text(String),
}

impl Reply {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Text(text) => text.as_bytes(),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl Codec {
    fn text_encoding(self) -> TextEncoding {
        match self {
            Self::Raw => TextEncoding::Utf8,
            Self::Text(encoding) => encoding,
        }
    }

    /// Encode outgoing command text.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self.text_encoding() {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).ok())
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| ModemError::Unencodable {
                    encoding: TextEncoding::Latin1.name(),
                    text: text.to_string(),
                }),
        }
    }

    /// Decode a response to text for the typed decoders.
    ///
    /// `Raw` sessions decode leniently, since they never promised any encoding.
    pub fn decode_text(self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Raw => Ok(String::from_utf8_lossy(bytes).into_owned()),
            Self::Text(TextEncoding::Utf8) => String::from_utf8(bytes.to_vec())
                .map_err(|e| ModemError::decode("utf-8 response", e.to_string())),
            Self::Text(TextEncoding::Latin1) => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    /// Wrap a response for the passthrough API.
    pub fn reply(self, bytes: Vec<u8>) -> Result<Reply> {
        match self {
            Self::Raw => Ok(Reply::Bytes(bytes)),
            Self::Text(_) => self.decode_text(&bytes).map(Reply::Text),
        }
    }
}
