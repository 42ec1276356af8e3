use std::io::{self, Read, Write};
use std::time::Duration;

use log::{debug, info, warn};
use serialport::{ClearBuffer, SerialPortInfo};

use crate::error::{ModemError, Result};

use super::Transport;

/// Serial line settings of the SIM868 UART.
const DATA_BITS: serialport::DataBits = serialport::DataBits::Eight;
const STOP_BITS: serialport::StopBits = serialport::StopBits::One;
const PARITY: serialport::Parity = serialport::Parity::None;

/// The SIM868 UART as seen through a host serial device (`/dev/ttyS0`,
/// a USB adapter, ...).
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    pub fn new(port: Box<dyn serialport::SerialPort>) -> Self {
        Self { port }
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.port.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let waiting = self.port.bytes_to_read().map_err(io::Error::other)?;
        Ok(waiting as usize)
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(io::Error::other)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::other)
    }
}

/// Open a serial port with the SIM868 settings (8N1) at the given baud rate.
pub fn open_port(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<SerialTransport> {
    let port = serialport::new(port_name, baud_rate)
        .data_bits(DATA_BITS)
        .stop_bits(STOP_BITS)
        .parity(PARITY)
        .timeout(timeout)
        .open()
        .map_err(ModemError::Serial)?;

    info!("opened {} at {} baud", port_name, baud_rate);
    Ok(SerialTransport::new(port))
}

/// List the serial ports present on this machine.
pub fn available_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(ModemError::Serial)?;

    if ports.is_empty() {
        warn!("no serial ports found");
    }
    for port in &ports {
        debug!("found port: {} ({:?})", port.port_name, port.port_type);
    }

    Ok(ports)
}
