use super::DsmrError;
use crate::config::SerialConfig;
use log::info;
use std::io::{self, ErrorKind, Read};
use std::time::Duration;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, StopBits};

/// Blocking byte source on top of a serial port.
///
/// The driver reports an idle line as a timeout; P1 ports are idle most of
/// the time between telegrams, so timeouts are retried and never reach the
/// frame reader.
pub struct SerialSource<P = Box<dyn SerialPort>> {
    port: P,
}

impl<P: Read> SerialSource<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }
}

impl<P: Read> Read for SerialSource<P> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.port.read(buf) {
                Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                other => return other,
            }
        }
    }
}

pub fn open_port(config: &SerialConfig) -> Result<SerialSource, DsmrError> {
    let port = tokio_serial::new(config.device.as_str(), config.baud_rate)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(config.read_timeout_ms))
        .open()
        .map_err(|e| DsmrError::Io(e.into()))?;

    info!("Opened serial port {}", config.device);
    Ok(SerialSource::new(port))
}
