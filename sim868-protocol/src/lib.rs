//! AT-command driver for the SIM868 GSM/GPRS/GNSS modem.
//!
//! [`Modem`] owns a serial [`Transport`](transport::Transport) and the
//! modem's [`PowerKey`](power::PowerKey), and exposes GNSS and SMS operations
//! on top of plain request/response exchanges.

pub mod codec;
pub mod command;
pub mod error;
pub mod gnss;
pub mod modem;
pub mod power;
pub mod protocol;
pub mod response;
pub mod session;
pub mod sms;
pub mod transport;

pub use codec::{Codec, Reply, TextEncoding};
pub use error::{ModemError, Result};
pub use gnss::{GnssField, GnssFix, Number};
pub use modem::{Modem, ModemConfig};
pub use session::SessionState;
pub use sms::{DEFAULT_SMS_SOURCE, SMS_MAX_LENGTH, SmsRecord, StorageStats};
