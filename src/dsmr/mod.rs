use crate::snapshot::LatestFrame;
use log::{debug, error, info, warn};
use std::io::BufRead;
use std::sync::Arc;
use thiserror::Error;

pub mod crc16;
pub mod structs;
pub mod obis_parser;
pub mod timestamp;
pub mod telegram;
pub mod reader;
pub mod meter_definitions;
#[cfg(feature = "serial")]
pub mod serial;

pub use self::crc16::checksum;
pub use obis_parser::parse_obis_line;
pub use reader::Reader;
pub use structs::{Frame, Object, Season, Timestamp, Value};
pub use telegram::decode_frame;
pub use timestamp::parse_timestamp;

#[derive(Error, Debug)]
pub enum DsmrError {
    #[error("End of stream while waiting for a telegram header")]
    EndOfStream,
    #[error("Stream ended inside a telegram")]
    TruncatedFrame,
    #[error("Invalid checksum line {0:?}")]
    InvalidChecksumFormat(String),
    #[error("Checksum mismatch: telegram says 0x{declared:04X}, computed 0x{computed:04X}")]
    ChecksumMismatch { declared: u16, computed: u16 },
    #[error("No values in object {0:?}")]
    MissingValues(String),
    #[error("Bad value format in object {0:?}")]
    MalformedValue(String),
    #[error("Bad value unit format in object {0:?}")]
    MalformedUnit(String),
    #[error("Unsupported number of values in object {0:?}")]
    UnsupportedValueCount(String),
    #[error("Invalid timestamp {0:?}")]
    InvalidTimestampFormat(String),
    #[error("Stream error: {0}")]
    Io(#[from] std::io::Error),
}

impl DsmrError {
    /// Stream level errors; everything else only rejects the current telegram.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DsmrError::EndOfStream | DsmrError::TruncatedFrame | DsmrError::Io(_))
    }
}

/// Feeds decoded telegrams from the meter into the shared [`LatestFrame`].
#[derive(Clone)]
pub struct DsmrManager {
    latest: Arc<LatestFrame>,
}

impl DsmrManager {
    pub fn new(latest: Arc<LatestFrame>) -> Self {
        Self { latest }
    }

    /// Reads telegrams until the stream fails.
    ///
    /// A clean end of stream returns `Ok(())`. Rejected telegrams are counted
    /// and skipped; the reader picks up again at the next header.
    pub fn run_blocking<R: BufRead>(&self, reader: &mut Reader<R>) -> Result<(), DsmrError> {
        loop {
            match reader.next_frame() {
                Ok(frame) => {
                    let header = frame.header.clone();
                    let seq = self.latest.store(frame);
                    debug!("Stored DSMR frame #{} from {}", seq, header);
                }
                Err(DsmrError::EndOfStream) => {
                    info!("DSMR stream closed");
                    return Ok(());
                }
                Err(e) if e.is_fatal() => {
                    error!("DSMR stream failed: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    self.latest.record_rejected();
                    warn!("Rejected DSMR telegram: {}", e);
                }
            }
        }
    }

    #[cfg(feature = "serial")]
    pub async fn start_thread(&self, config: crate::config::SerialConfig) -> Result<(), DsmrError> {
        info!("Starting DSMR reader on {} at {} baud", config.device, config.baud_rate);

        let manager = self.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let port = serial::open_port(&config)?;
            let mut reader = Reader::from_read(port);
            manager.run_blocking(&mut reader)
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(DsmrError::Io(std::io::Error::other(e))),
        }
    }
}
