use std::io;
use std::io::Read;
use std::io::Write;
use std::thread;
use std::time;

use crate::config;

/// Longest line we accept from the board before giving up on a terminator.
const MAX_LINE_LENGTH: usize = 256;

/// A byte-oriented duplex link to the microcontroller.
pub trait Transport {
    fn bytes_available(&mut self) -> Result<usize, failure::Error>;

    /// Reads up to and including the next newline, or whatever arrived before the read timeout.
    fn read_line(&mut self) -> Result<Vec<u8>, failure::Error>;

    fn write(&mut self, bytes: &[u8]) -> Result<(), failure::Error>;

    /// Releases the link.  Calling this more than once is harmless.
    fn close(&mut self);
}

pub struct SerialLink {
    log: slog::Logger,
    name: String,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialLink {
    pub fn open(log: slog::Logger, serial: &config::Serial) -> Result<Self, failure::Error> {
        let port = serialport::new(serial.port.as_str(), serial.baud_rate)
            .timeout(time::Duration::from_millis(serial.read_timeout_ms))
            .open()
            .map_err(|e| {
                format_err!(
                    "could not open serial port {} (check the name and that no other program \
                     holds it): {}",
                    serial.port,
                    e
                )
            })?;

        // Opening the port resets most Arduino boards; give the sketch time to boot.
        thread::sleep(time::Duration::from_millis(serial.settle_ms));

        info!(log, "serial link connected";
              "port" => &serial.port,
              "baud_rate" => serial.baud_rate);

        Ok(SerialLink {
            log,
            name: serial.port.clone(),
            port: Some(port),
        })
    }

    fn port(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, failure::Error> {
        let name = &self.name;
        self.port
            .as_mut()
            .ok_or_else(|| format_err!("serial port {} is closed", name))
    }
}

impl Transport for SerialLink {
    fn bytes_available(&mut self) -> Result<usize, failure::Error> {
        Ok(self.port()?.bytes_to_read()? as usize)
    }

    fn read_line(&mut self) -> Result<Vec<u8>, failure::Error> {
        let port = self.port()?;
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        while line.len() < MAX_LINE_LENGTH {
            match port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(line)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), failure::Error> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(port) = self.port.take() {
            drop(port);
            info!(self.log, "serial connection closed"; "port" => &self.name);
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}
