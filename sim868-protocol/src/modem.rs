use std::io;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use crate::codec::{Codec, Reply};
use crate::command::Command;
use crate::error::{ModemError, Result};
use crate::gnss::GnssFix;
use crate::power::PowerKey;
use crate::protocol::{self, FrameAccumulator, RawFrame, Status, Tokens};
use crate::response;
use crate::session::{self, PROBE_LEN, SessionState};
use crate::sms::{self, SmsRecord, StorageStats};
use crate::transport::Transport;

/// Longest single blocking read while waiting for a response.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for the modem session.
#[derive(Debug, Clone)]
pub struct ModemConfig {
    /// Serial baud rate.
    pub baud_rate: u32,
    /// How long to wait for the reply to the power probe.
    pub probe_timeout: Duration,
    /// How long to wait for a response to complete.
    pub response_timeout: Duration,
    /// Largest response accepted before giving up.
    pub max_frame_len: usize,
    /// How long the power key is held down.
    pub power_key_hold: Duration,
    pub codec: Codec,
    /// Press the power key during `open` if the modem is off.
    pub power_on_at_start: bool,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            probe_timeout: Duration::from_secs(1),
            response_timeout: Duration::from_secs(60),
            max_frame_len: 16 * 1024,
            power_key_hold: Duration::from_secs(4),
            codec: Codec::default(),
            power_on_at_start: true,
        }
    }
}

/// A session with a SIM868 modem.
///
/// Owns the transport and the power key. One command is in flight at a time;
/// every call blocks until the response completes or times out.
pub struct Modem {
    transport: Box<dyn Transport>,
    power_key: Box<dyn PowerKey>,
    config: ModemConfig,
    state: SessionState,
    /// Echo is detected once, by the first successful probe.
    echo_known: bool,
    /// Bytes received but not yet consumed by a frame.
    buf: Vec<u8>,
}

impl Modem {
    /// Create a session without talking to the modem. The state starts `off`.
    pub fn new(
        transport: Box<dyn Transport>,
        power_key: Box<dyn PowerKey>,
        config: ModemConfig,
    ) -> Self {
        Self {
            transport,
            power_key,
            config,
            state: SessionState::off(),
            echo_known: false,
            buf: Vec::with_capacity(256),
        }
    }

    /// Create a session and probe the modem.
    ///
    /// If the modem is off and `power_on_at_start` is set, it is powered on.
    pub fn open(
        transport: Box<dyn Transport>,
        power_key: Box<dyn PowerKey>,
        config: ModemConfig,
    ) -> Result<Self> {
        let mut modem = Self::new(transport, power_key, config);
        modem.state = modem.probe()?;
        modem.echo_known = modem.state.powered;
        info!(
            "modem is {} (echo {})",
            if modem.state.powered { "on" } else { "off" },
            if modem.state.echo_enabled { "on" } else { "off" },
        );

        if modem.config.power_on_at_start && !modem.state.powered {
            modem.turn_modem(true)?;
        }
        Ok(modem)
    }

    /// Open a serial port and start a session on it.
    #[cfg(feature = "serial")]
    pub fn connect(device: &str, power_key: Box<dyn PowerKey>, config: ModemConfig) -> Result<Self> {
        let transport =
            crate::transport::serial::open_port(device, config.baud_rate, config.probe_timeout)?;
        Self::open(Box::new(transport), power_key, config)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Send a bare `AT` and classify the reply.
    fn probe(&mut self) -> Result<SessionState> {
        self.transport.flush()?;
        self.buf.clear();
        self.write_command(&Command::Attention)?;

        let deadline = Instant::now() + self.config.probe_timeout;
        while self.buf.len() < PROBE_LEN
            && !session::probe_complete(&self.buf)
            && Instant::now() < deadline
        {
            self.fill_buf(deadline)?;
        }

        let reply: Vec<u8> = self.buf.drain(..self.buf.len().min(PROBE_LEN)).collect();
        self.buf.clear();
        trace!("probe reply: {:?}", String::from_utf8_lossy(&reply));
        session::classify_probe(&reply)
    }

    fn ensure_powered(&self) -> Result<()> {
        if self.state.powered {
            Ok(())
        } else {
            Err(ModemError::NotPowered)
        }
    }

    /// Turn the modem on or off. Does nothing if it is already in that state.
    pub fn turn_modem(&mut self, on: bool) -> Result<SessionState> {
        if on && !self.state.powered {
            info!("powering modem on");
            self.power_key.pulse(self.config.power_key_hold)?;
            self.state = self.state.with_powered(true);
            // Drop whatever the modem printed while booting.
            self.transport.flush()?;
            self.transport.reset_input_buffer()?;
            self.buf.clear();

            if !self.echo_known {
                self.detect_echo()?;
            }
        } else if !on && self.state.powered {
            info!("powering modem off");
            self.power_key.pulse(self.config.power_key_hold)?;
            self.state = self.state.with_powered(false);
            self.buf.clear();
        }
        Ok(self.state)
    }

    fn detect_echo(&mut self) -> Result<()> {
        let frame = self.exchange(&Command::Attention)?;
        self.state.echo_enabled = session::reply_has_echo(&frame.bytes);
        self.echo_known = true;
        debug!("echo {}", if self.state.echo_enabled { "on" } else { "off" });
        Ok(())
    }

    /// Send an arbitrary command and return the whole response.
    ///
    /// `command` omits the `AT+` prefix and `\r` unless `raw` is set, in which
    /// case it is written verbatim.
    pub fn at(&mut self, command: &str, raw: bool) -> Result<Reply> {
        self.ensure_powered()?;
        let command = Command::Custom {
            body: command.to_string(),
            raw,
        };
        let frame = self.exchange(&command)?;
        self.config.codec.reply(frame.bytes)
    }

    /// Send a command and tokenize its response, without judging the status.
    fn request(&mut self, command: &Command) -> Result<(Tokens, String)> {
        self.ensure_powered()?;
        let frame = self.exchange(command)?;
        let text = self.config.codec.decode_text(&frame.bytes)?;
        let tokens = protocol::tokenize(&text, self.state.echo_enabled)?;
        Ok((tokens, text))
    }

    /// Send a command and wait for the response.
    ///
    /// Fails with [`ModemError::CommandFailed`] if the modem answered with an error.
    pub fn send_command(&mut self, command: &Command) -> Result<Tokens> {
        let (tokens, text) = self.request(command)?;
        response::check_status(&tokens, &command.to_string(), &text)?;
        Ok(tokens)
    }

    fn write_command(&mut self, command: &Command) -> Result<()> {
        let bytes = self.config.codec.encode(&command.to_wire())?;
        trace!("TX: {:?}", String::from_utf8_lossy(&bytes));
        self.transport.write_all(&bytes)?;
        self.transport.flush()?;
        Ok(())
    }

    /// Write a command and read its complete response frame.
    fn exchange(&mut self, command: &Command) -> Result<RawFrame> {
        self.write_command(command)?;
        let frame = self.read_frame(command)?;
        self.transport.flush()?;
        Ok(frame)
    }

    /// Accumulate bytes until a terminal marker, the deadline, or the byte budget.
    fn read_frame(&mut self, command: &Command) -> Result<RawFrame> {
        let deadline = Instant::now() + self.config.response_timeout;
        let mut acc = FrameAccumulator::new(self.config.max_frame_len);

        loop {
            let mut consumed = 0;
            for &byte in &self.buf {
                consumed += 1;
                if acc.push(byte).is_complete() || acc.is_full() {
                    break;
                }
            }
            self.buf.drain(..consumed);

            if acc.state().is_complete() {
                if !self.buf.is_empty() {
                    debug!("{} bytes left over after {}", self.buf.len(), command);
                }
                let frame = acc
                    .into_frame()
                    .ok_or_else(|| ModemError::decode(command.to_string(), "incomplete frame"))?;
                trace!("RX: {:?}", String::from_utf8_lossy(&frame.bytes));
                return Ok(frame);
            }

            if acc.is_full() {
                warn!("response to {} exceeded {} bytes", command, self.config.max_frame_len);
                return Err(ModemError::FrameTooLarge {
                    command: command.to_string(),
                    limit: self.config.max_frame_len,
                });
            }

            if Instant::now() >= deadline {
                warn!("timeout waiting for response to {}", command);
                return Err(ModemError::Timeout {
                    command: command.to_string(),
                    received: acc.len(),
                });
            }

            self.fill_buf(deadline)?;
        }
    }

    /// Read data from the transport into the internal buffer.
    fn fill_buf(&mut self, deadline: Instant) -> Result<()> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }

        // Set the timeout for this read.
        let _ = self
            .transport
            .set_read_timeout(remaining.min(POLL_INTERVAL));

        let mut tmp = [0u8; 256];
        let want = self.transport.bytes_available()?.clamp(1, tmp.len());
        match self.transport.read(&mut tmp[..want]) {
            Ok(n) => {
                trace!("read {} bytes: {:?}", n, String::from_utf8_lossy(&tmp[..n]));
                self.buf.extend_from_slice(&tmp[..n]);
                Ok(())
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(())
            }
            Err(e) => Err(ModemError::Io(e)),
        }
    }

    /// Drop whatever arrived after the last frame.
    fn discard_leftovers(&mut self) -> Result<()> {
        let pending = self.buf.len() + self.transport.bytes_available()?;
        if pending > 0 {
            debug!("discarding {pending} bytes after the last frame");
            self.buf.clear();
            self.transport.reset_input_buffer()?;
        }
        Ok(())
    }

    // --- Modem operations ---

    /// Turn the GNSS engine on or off.
    pub fn turn_gnss(&mut self, on: bool) -> Result<()> {
        self.send_command(&Command::GnssPower(on))?;
        Ok(())
    }

    /// Read the current GNSS fix.
    ///
    /// Right after the GNSS is powered the receiver needs a while to acquire
    /// satellites; until then the fix fields are absent.
    pub fn read_position(&mut self) -> Result<GnssFix> {
        let tokens = self.send_command(&Command::GnssInfo)?;
        response::decode_gnss(&tokens)
    }

    /// Used slots and capacity of a message store.
    pub fn total_sms(&mut self, source: &str) -> Result<StorageStats> {
        let tokens = self.send_command(&Command::SelectStorage(source.to_string()))?;
        response::decode_storage(&tokens)
    }

    /// Read the message at `nth` (1-based). `None` if the slot is empty.
    ///
    /// With `check_range`, indices outside the store's capacity are rejected
    /// before anything is read.
    ///
    /// A message whose text contains a status marker (a line reading `OK`, or
    /// `> `) ends the response early. Such a message reads as empty or fails
    /// to decode; the rest of its response is dropped so later commands stay
    /// in step.
    pub fn read_sms(
        &mut self,
        nth: usize,
        source: &str,
        check_range: bool,
    ) -> Result<Option<SmsRecord>> {
        self.ensure_powered()?;
        if check_range {
            let stats = self.total_sms(source)?;
            if !stats.contains(nth) {
                return Err(ModemError::IndexOutOfRange {
                    index: nth,
                    capacity: stats.capacity,
                });
            }
        }

        self.send_command(&Command::TextMode)?;
        self.send_command(&Command::SelectStorage(source.to_string()))?;

        let command = Command::ReadSms(nth);
        let result = self.request(&command);
        self.discard_leftovers()?;
        let (tokens, text) = result?;
        if response::is_empty_slot(&tokens) {
            debug!("slot {nth} of {source} is empty");
            return Ok(None);
        }
        response::check_status(&tokens, &command.to_string(), &text)?;
        response::decode_sms(&tokens, nth)
    }

    /// Read every message in a store.
    ///
    /// Slots are scanned from 1 until as many messages as the store reports
    /// have been found. Empty slots are skipped, so gaps left by deletions are fine.
    pub fn read_all_sms(&mut self, source: &str) -> Result<Vec<SmsRecord>> {
        let stats = self.total_sms(source)?;
        let mut remaining = stats.used;
        // `used` comes from the modem and may exceed the capacity.
        let mut messages = Vec::new();
        let mut nth = 1;

        while remaining > 0 {
            if !stats.contains(nth) {
                warn!(
                    "{} reports {} messages but only {} were found",
                    source,
                    stats.used,
                    messages.len()
                );
                break;
            }
            if let Some(sms) = self.read_sms(nth, source, false)? {
                messages.push(sms);
                remaining -= 1;
            }
            nth += 1;
        }
        Ok(messages)
    }

    /// Delete the message at `nth` and return it.
    ///
    /// Other messages keep their indices. `None` if the slot was already empty.
    pub fn delete_sms(
        &mut self,
        nth: usize,
        source: &str,
        check_range: bool,
    ) -> Result<Option<SmsRecord>> {
        let sms = self.read_sms(nth, source, check_range)?;
        if sms.is_some() {
            self.send_command(&Command::SelectStorage(source.to_string()))?;
            self.send_command(&Command::DeleteSms(nth))?;
            info!("deleted message #{nth} from {source}");
        }
        Ok(sms)
    }

    /// Delete every message in a store and return them.
    pub fn delete_all_sms(&mut self, source: &str) -> Result<Vec<SmsRecord>> {
        let messages = self.read_all_sms(source)?;
        for sms in &messages {
            self.delete_sms(sms.index, source, false)?;
        }
        Ok(messages)
    }

    /// Send a text message, split into chunks of `max_chunk_len` characters.
    ///
    /// Every chunk goes out as its own SMS, without concatenation headers.
    /// A failed chunk aborts the rest; chunks already sent stay sent.
    pub fn send_sms(
        &mut self,
        message: &str,
        number: &str,
        max_chunk_len: usize,
    ) -> Result<Vec<Tokens>> {
        if message.is_empty() || number.is_empty() {
            return Err(ModemError::InvalidArgument(
                "message and number must not be empty",
            ));
        }
        self.ensure_powered()?;

        let chunks = sms::chunk_message(message, max_chunk_len)?;
        if chunks.len() > 1 {
            info!("sending message to {number} as {} separate SMS", chunks.len());
        }

        let mut replies = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            replies.push(self.send_single_sms(chunk, number)?);
        }
        Ok(replies)
    }

    fn send_single_sms(&mut self, text: &str, number: &str) -> Result<Tokens> {
        self.send_command(&Command::TextMode)?;

        let command = Command::SendSms(number.to_string());
        let frame = self.exchange(&command)?;
        if frame.status != Status::Prompt {
            self.transport.flush()?;
            let frame = String::from_utf8_lossy(&frame.bytes).into_owned();
            warn!("no prompt after {}: {:?}", command, frame);
            return Err(ModemError::PromptNotReceived {
                command: command.to_string(),
                frame,
            });
        }

        self.send_command(&Command::SmsBody(text.to_string()))
    }
}
