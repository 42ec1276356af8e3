use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use serde_json::{Value, json, to_string_pretty};
use sim868_protocol::power::{NoPowerKey, PowerKey};
use sim868_protocol::transport::serial::available_ports;
use sim868_protocol::{
    Codec, DEFAULT_SMS_SOURCE, Modem, ModemConfig, ModemError, SMS_MAX_LENGTH, TextEncoding,
};
use thiserror::Error;

use crate::gpio;

/// BCM line of the PWRKEY on the Waveshare hat (header pin 7).
pub const DEFAULT_POWER_PIN: u64 = 4;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Modem(#[from] ModemError),

    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("power key GPIO {pin}: {detail}")]
    Gpio { pin: u64, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Encoding {
    Utf8,
    Latin1,
    /// Bytes in and out, no text decoding.
    Raw,
}

impl From<Encoding> for Codec {
    fn from(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Utf8 => Codec::Text(TextEncoding::Utf8),
            Encoding::Latin1 => Codec::Text(TextEncoding::Latin1),
            Encoding::Raw => Codec::Raw,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[arg(
        short = 'd',
        long = "device",
        env = "WAVEHAT_DEVICE",
        default_value = "/dev/ttyS0",
        help = "Serial device the modem is attached to"
    )]
    pub device: String,

    #[arg(short = 'b', long = "baud", env = "WAVEHAT_BAUD", default_value_t = 115_200)]
    pub baud: u32,

    #[arg(
        long = "power-pin",
        env = "WAVEHAT_POWER_PIN",
        default_value_t = DEFAULT_POWER_PIN,
        help = "BCM GPIO line wired to PWRKEY"
    )]
    pub power_pin: u64,

    #[arg(long = "no-power-key", help = "Do not drive PWRKEY; power changes fail")]
    pub no_power_key: bool,

    #[arg(long = "no-auto-power", help = "Do not power the modem on when it is off")]
    pub no_auto_power: bool,

    #[arg(
        long = "timeout",
        env = "WAVEHAT_TIMEOUT",
        default_value_t = 60,
        help = "Seconds to wait for a command response"
    )]
    pub timeout_secs: u64,

    #[arg(long = "probe-timeout", env = "WAVEHAT_PROBE_TIMEOUT", default_value_t = 1000)]
    pub probe_timeout_ms: u64,

    #[arg(long = "power-hold", env = "WAVEHAT_POWER_HOLD", default_value_t = 4)]
    pub power_hold_secs: u64,

    #[arg(
        short = 'e',
        long = "encoding",
        env = "WAVEHAT_ENCODING",
        value_enum,
        default_value_t = Encoding::Utf8
    )]
    pub encoding: Encoding,

    #[command(subcommand)]
    pub command: Cmd,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// List serial ports.
    Ports,
    #[command(flatten)]
    Modem(ModemCmd),
}

/// Commands that talk to the modem.
#[derive(Debug, Subcommand)]
pub enum ModemCmd {
    /// Turn the modem on or off.
    Power { state: Switch },
    /// Turn the GNSS engine on or off.
    Gnss { state: Switch },
    /// Print the current GNSS fix.
    Position,
    /// Work with stored messages.
    Sms {
        #[command(subcommand)]
        action: SmsCmd,
    },
    /// Send an arbitrary AT command and print the raw response.
    At {
        /// Command without the `AT+` prefix, unless --raw.
        command: String,
        #[arg(long, help = "Send the command verbatim")]
        raw: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    fn is_on(self) -> bool {
        self == Switch::On
    }
}

#[derive(Debug, Subcommand)]
pub enum SmsCmd {
    /// Used slots and capacity.
    Count {
        #[arg(short, long, default_value = DEFAULT_SMS_SOURCE)]
        source: String,
    },
    /// Read the message at a 1-based slot.
    Read {
        index: usize,
        #[arg(short, long, default_value = DEFAULT_SMS_SOURCE)]
        source: String,
        #[arg(long)]
        no_range_check: bool,
    },
    /// Read every stored message.
    List {
        #[arg(short, long, default_value = DEFAULT_SMS_SOURCE)]
        source: String,
    },
    /// Delete the message at a slot and print it.
    Delete {
        index: usize,
        #[arg(short, long, default_value = DEFAULT_SMS_SOURCE)]
        source: String,
        #[arg(long)]
        no_range_check: bool,
    },
    /// Delete every message in the store.
    DeleteAll {
        #[arg(short, long, default_value = DEFAULT_SMS_SOURCE)]
        source: String,
    },
    /// Send a text message, split into separate SMS when too long.
    Send {
        number: String,
        message: String,
        #[arg(long, default_value_t = SMS_MAX_LENGTH)]
        chunk_len: usize,
    },
}

impl Cli {
    pub fn modem_config(&self) -> ModemConfig {
        ModemConfig {
            baud_rate: self.baud,
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            response_timeout: Duration::from_secs(self.timeout_secs),
            power_key_hold: Duration::from_secs(self.power_hold_secs),
            codec: self.encoding.into(),
            // `power` decides for itself.
            power_on_at_start: !self.no_auto_power
                && !matches!(self.command, Cmd::Modem(ModemCmd::Power { .. })),
            ..ModemConfig::default()
        }
    }

    fn power_key(&self) -> Result<Box<dyn PowerKey>, CliError> {
        if self.no_power_key {
            return Ok(Box::new(NoPowerKey));
        }
        gpio::power_key(self.power_pin)
    }
}

pub fn run(cli: Cli) -> Result<(), CliError> {
    let output = match &cli.command {
        Cmd::Ports => list_ports()?,
        Cmd::Modem(command) => {
            let mut modem = Modem::connect(&cli.device, cli.power_key()?, cli.modem_config())?;
            info!("connected to {}", cli.device);
            match run_modem(&mut modem, command)? {
                Some(value) => value,
                None => return Ok(()),
            }
        }
    };
    print(&output)
}

/// Run one command against the modem. `None` when the output was already written.
fn run_modem(modem: &mut Modem, command: &ModemCmd) -> Result<Option<Value>, CliError> {
    let value = match command {
        ModemCmd::Power { state } => json!({ "powered": modem.turn_modem(state.is_on())?.powered }),
        ModemCmd::Gnss { state } => {
            modem.turn_gnss(state.is_on())?;
            json!({ "gnss": state.is_on() })
        }
        ModemCmd::Position => serde_json::to_value(modem.read_position()?)?,
        ModemCmd::Sms { action } => run_sms(modem, action)?,
        ModemCmd::At { command, raw } => {
            // Raw responses go out untouched.
            println!("{}", modem.at(command, *raw)?);
            return Ok(None);
        }
    };
    Ok(Some(value))
}

fn run_sms(modem: &mut Modem, action: &SmsCmd) -> Result<Value, CliError> {
    let value = match action {
        SmsCmd::Count { source } => serde_json::to_value(modem.total_sms(source)?)?,
        SmsCmd::Read {
            index,
            source,
            no_range_check,
        } => serde_json::to_value(modem.read_sms(*index, source, !no_range_check)?)?,
        SmsCmd::List { source } => serde_json::to_value(modem.read_all_sms(source)?)?,
        SmsCmd::Delete {
            index,
            source,
            no_range_check,
        } => serde_json::to_value(modem.delete_sms(*index, source, !no_range_check)?)?,
        SmsCmd::DeleteAll { source } => serde_json::to_value(modem.delete_all_sms(source)?)?,
        SmsCmd::Send {
            number,
            message,
            chunk_len,
        } => {
            let replies = modem.send_sms(message, number, *chunk_len)?;
            json!({
                "sent": replies.len(),
                "replies": replies.iter().map(|r| r.lines.clone()).collect::<Vec<_>>(),
            })
        }
    };
    Ok(value)
}

fn list_ports() -> Result<Value, CliError> {
    let ports = available_ports()?
        .into_iter()
        .map(|p| json!({ "name": p.port_name, "type": format!("{:?}", p.port_type) }))
        .collect();
    Ok(Value::Array(ports))
}

fn print(value: &Value) -> Result<(), CliError> {
    println!("{}", to_string_pretty(value)?);
    Ok(())
}
