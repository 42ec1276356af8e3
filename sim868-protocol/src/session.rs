use crate::error::{ModemError, Result};

/// Reply to a bare `AT` with echo on.
pub const PROBE_ECHO_ON: &[u8] = b"AT\r\r\nOK\r\n";
/// Reply to a bare `AT` with echo off.
pub const PROBE_ECHO_OFF: &[u8] = b"\r\nOK\r\n";
/// Bytes read while probing, enough for the longer reply.
pub const PROBE_LEN: usize = PROBE_ECHO_ON.len();

/// What the session knows about the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
    pub powered: bool,
    /// The modem repeats each command before answering it.
    pub echo_enabled: bool,
}

impl SessionState {
    pub fn off() -> Self {
        Self::default()
    }

    pub fn with_powered(self, powered: bool) -> Self {
        Self { powered, ..self }
    }
}

/// Classify the reply to the power probe.
///
/// Silence means the modem is off. The two known replies mean it is on. Any
/// other bytes come from a modem we cannot classify, which is an error rather
/// than a guess.
pub fn classify_probe(reply: &[u8]) -> Result<SessionState> {
    match reply {
        [] => Ok(SessionState::off()),
        PROBE_ECHO_ON => Ok(SessionState {
            powered: true,
            echo_enabled: true,
        }),
        PROBE_ECHO_OFF => Ok(SessionState {
            powered: true,
            echo_enabled: false,
        }),
        other => Err(ModemError::decode(
            "AT probe reply",
            format!("unrecognised bytes {:?}", String::from_utf8_lossy(other)),
        )),
    }
}

const ECHOED_ATTENTION: &[u8] = b"AT\r";

/// Whether the reply to a bare `AT` contains the echoed command.
///
/// Right after power-on the modem interleaves unsolicited boot messages
/// (`+CPIN: READY`, `Call Ready`, ...), so the echo need not come first.
pub fn reply_has_echo(reply: &[u8]) -> bool {
    reply.windows(ECHOED_ATTENTION.len()).any(|w| w == ECHOED_ATTENTION)
}

/// Whether a probe reply read so far is already one of the known replies.
pub fn probe_complete(reply: &[u8]) -> bool {
    reply == PROBE_ECHO_ON || reply == PROBE_ECHO_OFF
}
