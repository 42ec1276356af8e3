use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use sim868_protocol::power::PowerKey;
use sim868_protocol::transport::Transport;
use sim868_protocol::{
    Codec, GnssField, Modem, ModemConfig, ModemError, Number, Reply, SmsRecord, StorageStats,
    TextEncoding,
};

const FIX: &str = "+CGNSINF: 1,1,20230114193052.000,-34.603722,-58.381592,25.0,0.00,285.3,1,,1.1,1.4,0.9,,12,9,3,,38,,";
const BOOT_MESSAGES: &[u8] = b"\r\nRDY\r\n\r\n+CFUN: 1\r\n\r\n+CPIN: READY\r\n\r\nCall Ready\r\n";
const NO_FIX: &str = "+CGNSINF: 0,,,,,,,,,,,,,,,,,,,,";

#[derive(Clone)]
struct Stored {
    sender: String,
    date: String,
    body: String,
}

#[derive(Default)]
struct FakeState {
    powered: bool,
    echo: bool,
    gnss_on: bool,
    slots: Vec<Option<Stored>>,
    /// Bytes sent by the modem and not yet read.
    rx: VecDeque<u8>,
    /// Every write, as issued by the driver.
    written: Vec<Vec<u8>>,
    line: Vec<u8>,
    awaiting_body: Option<String>,
    sent: Vec<(String, String)>,
    presses: usize,
    fail_prompt: bool,
    silent: bool,
    garbage_probe: bool,
    /// Boot messages arrive with the first command after power-on instead of
    /// during the key press.
    late_boot_messages: bool,
    pending_boot: Vec<u8>,
    /// Replaces the computed `+CPMS` report.
    storage_report: Option<String>,
}

impl FakeState {
    fn emit(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    fn respond(&mut self, lines: &[String], status: &str) {
        for line in lines {
            self.emit(format!("\r\n{line}\r\n").as_bytes());
        }
        self.emit(format!("\r\n{status}\r\n").as_bytes());
    }

    fn ok(&mut self) {
        self.respond(&[], "OK");
    }

    fn used(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn feed(&mut self, byte: u8) {
        if let Some(number) = self.awaiting_body.clone() {
            if byte == 0x1A {
                let text = String::from_utf8(std::mem::take(&mut self.line)).unwrap();
                self.awaiting_body = None;
                if self.echo {
                    self.emit(text.as_bytes());
                }
                self.sent.push((number, text));
                let reference = self.sent.len();
                self.respond(&[format!("+CMGS: {reference}")], "OK");
            } else {
                self.line.push(byte);
            }
            return;
        }

        self.line.push(byte);
        if byte == b'\r' {
            let line = std::mem::take(&mut self.line);
            let boot = std::mem::take(&mut self.pending_boot);
            self.emit(&boot);
            if self.echo && !self.silent {
                self.emit(&line);
            }
            let command = String::from_utf8(line).unwrap();
            self.handle(command.trim_end_matches('\r'));
        }
    }

    fn handle(&mut self, command: &str) {
        if self.silent {
            return;
        }
        if command == "AT" {
            if self.garbage_probe {
                self.emit(b"\x00\xff");
            } else {
                self.ok();
            }
        } else if command == "AT+CGNSPWR=1" || command == "AT+CGNSPWR=0" {
            self.gnss_on = command.ends_with('1');
            self.ok();
        } else if command == "AT+CGNSINF" {
            let report = if self.gnss_on { FIX } else { NO_FIX };
            self.respond(&[report.to_string()], "OK");
        } else if command == "AT+CMGF=1" {
            self.ok();
        } else if let Some(storage) = command.strip_prefix("AT+CPMS=") {
            if storage == "\"SM\"" {
                let (used, cap) = (self.used(), self.slots.len());
                let report = self
                    .storage_report
                    .clone()
                    .unwrap_or_else(|| format!("+CPMS: {used},{cap},{used},{cap},{used},{cap}"));
                self.respond(&[report], "OK");
            } else {
                self.respond(&[], "ERROR");
            }
        } else if let Some(nth) = command.strip_prefix("AT+CMGR=") {
            let nth: usize = nth.parse().unwrap();
            match self.slots.get(nth.wrapping_sub(1)).cloned() {
                Some(Some(sms)) => self.respond(
                    &[
                        format!("+CMGR: \"REC READ\",\"{}\",\"\",\"{}\"", sms.sender, sms.date),
                        sms.body.clone(),
                    ],
                    "OK",
                ),
                Some(None) => self.ok(),
                None => self.respond(&[], "+CMS ERROR: 321"),
            }
        } else if let Some(nth) = command.strip_prefix("AT+CMGD=") {
            let nth: usize = nth.parse().unwrap();
            if let Some(slot) = self.slots.get_mut(nth - 1) {
                *slot = None;
            }
            self.ok();
        } else if let Some(number) = command.strip_prefix("AT+CMGS=") {
            if self.fail_prompt {
                self.respond(&[], "ERROR");
            } else {
                self.emit(b"\r\n> ");
                self.awaiting_body = Some(number.trim_matches('"').to_string());
            }
        } else {
            self.respond(&[], "ERROR");
        }
    }
}

#[derive(Clone, Default)]
struct FakeSim868(Arc<Mutex<FakeState>>);

impl FakeSim868 {
    fn powered(echo: bool) -> Self {
        let fake = Self::default();
        {
            let mut s = fake.state();
            s.powered = true;
            s.echo = echo;
        }
        fake
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.0.lock().unwrap()
    }

    fn with_messages(self, slots: Vec<Option<(&str, &str)>>) -> Self {
        self.state().slots = slots
            .into_iter()
            .map(|slot| {
                slot.map(|(sender, body)| Stored {
                    sender: sender.to_string(),
                    date: "23/01/14,16:30:52-12".to_string(),
                    body: body.to_string(),
                })
            })
            .collect();
        self
    }

    fn key(&self) -> FakeKey {
        FakeKey(self.0.clone())
    }
}

impl Transport for FakeSim868 {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut s = self.state();
        s.written.push(buf.to_vec());
        if s.powered {
            for &byte in buf {
                s.feed(byte);
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut s = self.state();
        if s.rx.is_empty() {
            drop(s);
            thread::sleep(Duration::from_millis(1));
            return Err(io::ErrorKind::TimedOut.into());
        }
        let n = buf.len().min(s.rx.len());
        for (slot, byte) in buf.iter_mut().zip(s.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.state().rx.len())
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        self.state().rx.clear();
        Ok(())
    }

    fn set_read_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }
}

struct FakeKey(Arc<Mutex<FakeState>>);

impl PowerKey for FakeKey {
    fn pulse(&mut self, _hold: Duration) -> sim868_protocol::Result<()> {
        let mut s = self.0.lock().unwrap();
        s.presses += 1;
        s.powered = !s.powered;
        if s.powered {
            s.echo = true;
            if s.late_boot_messages {
                s.pending_boot = BOOT_MESSAGES.to_vec();
            } else {
                s.emit(BOOT_MESSAGES);
            }
        }
        Ok(())
    }
}

fn config() -> ModemConfig {
    ModemConfig {
        probe_timeout: Duration::from_millis(50),
        response_timeout: Duration::from_millis(200),
        power_key_hold: Duration::ZERO,
        ..ModemConfig::default()
    }
}

fn open(fake: &FakeSim868) -> Modem {
    Modem::open(Box::new(fake.clone()), Box::new(fake.key()), config()).unwrap()
}

fn inbox() -> Vec<Option<(&'static str, &'static str)>> {
    vec![
        Some(("+5491100000001", "first")),
        Some(("+5491100000002", "second")),
        Some(("+5491100000003", "third")),
    ]
}

#[test]
fn test_open_detects_echo_on() {
    let fake = FakeSim868::powered(true);
    let modem = open(&fake);
    assert!(modem.state().powered);
    assert!(modem.state().echo_enabled);
    assert_eq!(fake.state().presses, 0);
}

#[test]
fn test_open_detects_echo_off() {
    let fake = FakeSim868::powered(false);
    let modem = open(&fake);
    assert!(modem.state().powered);
    assert!(!modem.state().echo_enabled);
}

#[test]
fn test_open_powers_on_and_discards_boot_noise() {
    let fake = FakeSim868::default();
    let mut modem = open(&fake);
    assert_eq!(fake.state().presses, 1);
    assert!(modem.state().powered);
    assert!(modem.state().echo_enabled);

    let stats = modem.total_sms("SM").unwrap();
    assert_eq!(stats, StorageStats { used: 0, capacity: 0 });
}

#[test]
fn test_echo_detected_behind_late_boot_messages() {
    let fake = FakeSim868::default().with_messages(inbox());
    fake.state().late_boot_messages = true;
    let mut modem = open(&fake);
    assert!(modem.state().echo_enabled);

    let stats = modem.total_sms("SM").unwrap();
    assert_eq!(stats, StorageStats { used: 3, capacity: 3 });
    assert_eq!(modem.read_sms(1, "SM", true).unwrap().unwrap().body, "first");
}

#[test]
fn test_probe_mismatch_is_surfaced() {
    let fake = FakeSim868::powered(true);
    fake.state().garbage_probe = true;
    let err = Modem::open(Box::new(fake.clone()), Box::new(fake.key()), config())
        .err()
        .unwrap();
    assert!(matches!(err, ModemError::Decode { .. }));
}

#[test]
fn test_unpowered_operations_do_not_touch_transport() {
    let fake = FakeSim868::default();
    let cfg = ModemConfig {
        power_on_at_start: false,
        ..config()
    };
    let mut modem = Modem::open(Box::new(fake.clone()), Box::new(fake.key()), cfg).unwrap();
    assert!(!modem.state().powered);
    let writes = fake.state().written.len();

    assert!(matches!(modem.read_position(), Err(ModemError::NotPowered)));
    assert!(matches!(modem.total_sms("SM"), Err(ModemError::NotPowered)));
    assert!(matches!(modem.read_sms(1, "SM", true), Err(ModemError::NotPowered)));
    assert!(matches!(modem.send_sms("hi", "+1", 160), Err(ModemError::NotPowered)));
    assert!(matches!(modem.at("CSQ", false), Err(ModemError::NotPowered)));
    assert_eq!(fake.state().written.len(), writes);
}

#[test]
fn test_turn_modem_off_and_on() {
    let fake = FakeSim868::powered(true);
    let mut modem = open(&fake);

    let state = modem.turn_modem(false).unwrap();
    assert!(!state.powered);
    assert!(state.echo_enabled);
    assert!(matches!(modem.turn_gnss(true), Err(ModemError::NotPowered)));

    // Already off: no press.
    modem.turn_modem(false).unwrap();
    assert_eq!(fake.state().presses, 1);

    let state = modem.turn_modem(true).unwrap();
    assert!(state.powered);
    assert_eq!(fake.state().presses, 2);
    modem.turn_gnss(true).unwrap();
}

#[test]
fn test_read_position() {
    let fake = FakeSim868::powered(true);
    let mut modem = open(&fake);

    let fix = modem.read_position().unwrap();
    assert!(!fix.is_running());
    assert_eq!(fix.latitude(), None);

    modem.turn_gnss(true).unwrap();
    let fix = modem.read_position().unwrap();
    assert!(fix.has_fix());
    assert_eq!(fix.latitude(), Some(-34.603722));
    assert_eq!(fix.longitude(), Some(-58.381592));
    assert_eq!(fix.get(GnssField::SatellitesInView), Some(Number::Int(12)));
    assert_eq!(fix.get(GnssField::Reserved3), None);
}

#[test]
fn test_total_sms() {
    let fake = FakeSim868::powered(true).with_messages(vec![
        Some(("+1", "a")),
        None,
        Some(("+2", "b")),
        None,
    ]);
    let mut modem = open(&fake);
    let stats = modem.total_sms("sm").unwrap();
    assert_eq!(stats, StorageStats { used: 2, capacity: 4 });

    let err = modem.total_sms("ME").unwrap_err();
    assert!(matches!(err, ModemError::CommandFailed { .. }));
}

#[test]
fn test_read_sms_range_check() {
    let fake = FakeSim868::powered(true).with_messages(inbox());
    let mut modem = open(&fake);

    for nth in [1, 2, 3] {
        assert!(modem.read_sms(nth, "SM", true).unwrap().is_some());
    }
    for nth in [0, 4] {
        match modem.read_sms(nth, "SM", true) {
            Err(ModemError::IndexOutOfRange { index, capacity }) => {
                assert_eq!(index, nth);
                assert_eq!(capacity, 3);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    // Unchecked, the modem itself reports the bad index as an empty slot.
    assert_eq!(modem.read_sms(4, "SM", false).unwrap(), None);
}

#[test]
fn test_read_sms_echo_off() {
    let fake = FakeSim868::powered(false).with_messages(inbox());
    let mut modem = open(&fake);
    let sms = modem.read_sms(2, "SM", true).unwrap().unwrap();
    assert_eq!(
        sms,
        SmsRecord {
            source: "REC READ".to_string(),
            sender: "+5491100000002".to_string(),
            timestamp: "23/01/14,16:30:52-12".to_string(),
            body: "second".to_string(),
            index: 2,
        }
    );
}

#[test]
fn test_delete_does_not_renumber() {
    let fake = FakeSim868::powered(true).with_messages(inbox());
    let mut modem = open(&fake);

    let first = modem.read_sms(1, "SM", true).unwrap();
    let third = modem.read_sms(3, "SM", true).unwrap();

    let deleted = modem.delete_sms(2, "SM", true).unwrap().unwrap();
    assert_eq!(deleted.body, "second");
    assert_eq!(deleted.index, 2);

    assert_eq!(modem.read_sms(1, "SM", true).unwrap(), first);
    assert_eq!(modem.read_sms(3, "SM", true).unwrap(), third);
    assert_eq!(modem.read_sms(2, "SM", true).unwrap(), None);
    assert_eq!(modem.total_sms("SM").unwrap().used, 2);

    // Deleting an empty slot is a no-op.
    assert_eq!(modem.delete_sms(2, "SM", true).unwrap(), None);
}

#[test]
fn test_read_all_sms_skips_gaps() {
    let fake = FakeSim868::powered(true).with_messages(vec![
        Some(("+1", "a")),
        None,
        Some(("+2", "b")),
        None,
        Some(("+3", "c")),
        None,
    ]);
    let mut modem = open(&fake);
    let all = modem.read_all_sms("SM").unwrap();
    let indices: Vec<usize> = all.iter().map(|sms| sms.index).collect();
    let bodies: Vec<&str> = all.iter().map(|sms| sms.body.as_str()).collect();
    assert_eq!(indices, vec![1, 3, 5]);
    assert_eq!(bodies, vec!["a", "b", "c"]);
}

#[test]
fn test_read_all_sms_with_used_above_capacity() {
    let fake = FakeSim868::powered(true).with_messages(vec![Some(("+1", "only"))]);
    fake.state().storage_report = Some("+CPMS: 4294967295,1,0,1,0,1".to_string());
    let mut modem = open(&fake);

    let stats = modem.total_sms("SM").unwrap();
    assert_eq!(stats, StorageStats { used: u32::MAX, capacity: 1 });
    let all = modem.read_all_sms("SM").unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].body, "only");
}

#[test]
fn test_marker_in_message_text_keeps_session_in_step() {
    let fake = FakeSim868::powered(true).with_messages(vec![
        Some(("+1", "OK")),
        Some(("+2", "after")),
    ]);
    let mut modem = open(&fake);

    // The first message cuts its own response short; only the reply matters
    // for what follows.
    let _ = modem.read_sms(1, "SM", true);
    assert_eq!(modem.total_sms("SM").unwrap(), StorageStats { used: 2, capacity: 2 });
    assert_eq!(modem.read_sms(2, "SM", true).unwrap().unwrap().body, "after");
}

#[test]
fn test_delete_all_sms() {
    let fake = FakeSim868::powered(true).with_messages(inbox());
    let mut modem = open(&fake);
    let deleted = modem.delete_all_sms("SM").unwrap();
    assert_eq!(deleted.len(), 3);
    assert_eq!(modem.total_sms("SM").unwrap(), StorageStats { used: 0, capacity: 3 });
    assert!(modem.read_all_sms("SM").unwrap().is_empty());
}

#[test]
fn test_send_sms_in_chunks() {
    let fake = FakeSim868::powered(true);
    let mut modem = open(&fake);

    let message: String = ('a'..='z').cycle().take(350).collect();
    let replies = modem.send_sms(&message, "+923234206521", 160).unwrap();
    assert_eq!(replies.len(), 3);
    assert!(replies.iter().all(|r| r.is_ok()));
    assert_eq!(replies[2].lines, vec!["+CMGS: 3".to_string()]);

    let s = fake.state();
    assert_eq!(s.sent.len(), 3);
    assert!(s.sent.iter().all(|(number, _)| number == "+923234206521"));
    let texts: Vec<&str> = s.sent.iter().map(|(_, text)| text.as_str()).collect();
    assert_eq!(texts.iter().map(|t| t.len()).collect::<Vec<_>>(), vec![160, 160, 30]);
    assert_eq!(texts.concat(), message);
    assert!(s.written.iter().any(|w| w.last() == Some(&0x1A)));
}

#[test]
fn test_send_sms_without_prompt() {
    let fake = FakeSim868::powered(true);
    fake.state().fail_prompt = true;
    let mut modem = open(&fake);

    let err = modem.send_sms("hello", "+1", 160).unwrap_err();
    assert!(matches!(err, ModemError::PromptNotReceived { .. }));
    assert!(fake.state().sent.is_empty());
}

#[test]
fn test_send_sms_rejects_empty() {
    let fake = FakeSim868::powered(true);
    let mut modem = open(&fake);
    assert!(matches!(
        modem.send_sms("", "+1", 160),
        Err(ModemError::InvalidArgument(_))
    ));
    assert!(matches!(
        modem.send_sms("hi", "", 160),
        Err(ModemError::InvalidArgument(_))
    ));
    assert!(matches!(
        modem.send_sms("hi", "+1", 0),
        Err(ModemError::InvalidArgument(_))
    ));
}

#[test]
fn test_passthrough() {
    let fake = FakeSim868::powered(true);
    let mut modem = open(&fake);

    let reply = modem.at("CMGF=1", false).unwrap();
    assert_eq!(reply, Reply::Text("AT+CMGF=1\r\r\nOK\r\n".to_string()));

    // Errors are returned as-is by the passthrough.
    let reply = modem.at("BOGUS", false).unwrap();
    assert!(reply.to_string().ends_with("ERROR\r\n"));

    let raw = Modem::open(
        Box::new(fake.clone()),
        Box::new(fake.key()),
        ModemConfig {
            codec: Codec::Raw,
            ..config()
        },
    )
    .unwrap()
    .at("AT\r", true)
    .unwrap();
    assert_eq!(raw, Reply::Bytes(b"AT\r\r\nOK\r\n".to_vec()));
}

#[test]
fn test_latin1_session() {
    let fake = FakeSim868::powered(true);
    let cfg = ModemConfig {
        codec: Codec::Text(TextEncoding::Latin1),
        ..config()
    };
    let mut modem = Modem::open(Box::new(fake.clone()), Box::new(fake.key()), cfg).unwrap();
    assert!(matches!(
        modem.send_sms("\u{20ac}5", "+1", 160),
        Err(ModemError::Unencodable { .. })
    ));
}

#[test]
fn test_timeout() {
    let fake = FakeSim868::powered(true);
    let mut modem = open(&fake);
    fake.state().silent = true;

    match modem.read_position() {
        Err(ModemError::Timeout { command, received }) => {
            assert_eq!(command, "AT+CGNSINF");
            assert_eq!(received, 0);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_frame_budget() {
    let fake = FakeSim868::powered(true);
    let cfg = ModemConfig {
        max_frame_len: 32,
        ..config()
    };
    let mut modem = Modem::open(Box::new(fake.clone()), Box::new(fake.key()), cfg).unwrap();
    modem.turn_gnss(true).unwrap();
    assert!(matches!(
        modem.read_position(),
        Err(ModemError::FrameTooLarge { limit: 32, .. })
    ));
}
