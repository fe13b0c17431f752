use super::crc16::{checksum, parse_checksum_line};
use super::structs::Frame;
use super::telegram::decode_frame;
use super::DsmrError;
use log::debug;
use std::io::{BufRead, BufReader, ErrorKind, Read};

const START_MARKER: u8 = b'/';
const END_MARKER: u8 = b'!';

/// Pulls telegrams out of a P1 byte stream.
///
/// Each call to [`Reader::next_frame`] blocks until one complete telegram
/// plus its checksum line has been read. After a rejected telegram the next
/// call simply scans forward to the next `/`, which is also how reading
/// starts in the middle of a transmission.
pub struct Reader<R> {
    inner: R,
    done: bool,
}

impl<R: Read> Reader<BufReader<R>> {
    pub fn from_read(inner: R) -> Self {
        Reader::new(BufReader::new(inner))
    }
}

impl<R: BufRead> Reader<R> {
    pub fn new(inner: R) -> Self {
        Reader { inner, done: false }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn next_frame(&mut self) -> Result<Frame, DsmrError> {
        self.skip_to_start()?;

        let mut body = Vec::new();
        self.inner.read_until(END_MARKER, &mut body)?;
        if body.last() != Some(&END_MARKER) {
            return Err(DsmrError::TruncatedFrame);
        }

        let mut crc_line = Vec::new();
        self.inner.read_until(b'\n', &mut crc_line)?;
        if crc_line.last() != Some(&b'\n') {
            return Err(DsmrError::TruncatedFrame);
        }

        let crc_text = latin1_to_string(&crc_line);
        let declared = parse_checksum_line(&crc_text)
            .ok_or_else(|| DsmrError::InvalidChecksumFormat(crc_text.trim().to_string()))?;
        let computed = checksum(&body);
        if declared != computed {
            return Err(DsmrError::ChecksumMismatch { declared, computed });
        }

        decode_frame(&latin1_to_string(&body))
    }

    /* Leaves the start marker in the buffer */
    fn skip_to_start(&mut self) -> Result<(), DsmrError> {
        let mut skipped = 0usize;
        loop {
            let (found, available) = match self.inner.fill_buf() {
                Ok(buf) => (buf.iter().position(|&b| b == START_MARKER), buf.len()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(DsmrError::Io(e)),
            };

            if available == 0 {
                return Err(DsmrError::EndOfStream);
            }

            match found {
                Some(pos) => {
                    self.inner.consume(pos);
                    skipped += pos;
                    break;
                }
                None => {
                    self.inner.consume(available);
                    skipped += available;
                }
            }
        }

        if skipped > 0 {
            debug!("Skipped {} bytes while waiting for a DSMR header", skipped);
        }
        Ok(())
    }
}

/// Iterates over telegrams until the stream ends.
///
/// Rejected telegrams are yielded as errors and reading goes on with the
/// next one. A fatal error is yielded once and ends the iteration.
impl<R: BufRead> Iterator for Reader<R> {
    type Item = Result<Frame, DsmrError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_frame() {
            Err(DsmrError::EndOfStream) => {
                self.done = true;
                None
            }
            Err(e) if e.is_fatal() => {
                self.done = true;
                Some(Err(e))
            }
            other => Some(other),
        }
    }
}

pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsmr::testdata::{with_checksum, SAMPLE_TELEGRAM};
    use std::io::Cursor;

    /* Hands out at most `chunk` bytes per read, like a slow serial line */
    struct Trickle {
        data: Cursor<Vec<u8>>,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.data.read(&mut buf[..n])
        }
    }

    fn reader_for(data: Vec<u8>) -> Reader<Cursor<Vec<u8>>> {
        Reader::new(Cursor::new(data))
    }

    #[test]
    fn test_read_single_frame() {
        let mut reader = reader_for(with_checksum(SAMPLE_TELEGRAM).into_bytes());
        let frame = reader.next_frame().unwrap();

        assert_eq!(frame.raw, SAMPLE_TELEGRAM);
        assert_eq!(frame.version, "50");
        assert_eq!(frame.equipment_id, "4B384547303034303436333935353037");
        assert!(!frame.time.is_zero());
        assert!(matches!(reader.next_frame(), Err(DsmrError::EndOfStream)));
    }

    #[test]
    fn test_raw_round_trip() {
        let stream = with_checksum(SAMPLE_TELEGRAM).into_bytes();
        let frame = reader_for(stream.clone()).next_frame().unwrap();
        assert_eq!(frame.raw_bytes(), SAMPLE_TELEGRAM.as_bytes());
        assert!(stream.starts_with(&frame.raw_bytes()));
    }

    #[test]
    fn test_skips_leading_garbage() {
        let mut stream = b"12.345*kWh)\r\n1-0:2.8.1(000000.000*kWh)\r\n!ABCD\r\n".to_vec();
        stream.extend_from_slice(with_checksum(SAMPLE_TELEGRAM).as_bytes());

        let frame = reader_for(stream).next_frame().unwrap();
        assert_eq!(frame.raw, SAMPLE_TELEGRAM);
    }

    #[test]
    fn test_two_consecutive_frames_in_order() {
        let second = "/XMX5LGBBFG1012463207\r\n\r\n1-3:0.2.8(42)\r\n1-0:1.8.1(000002.000*kWh)\r\n!";
        let mut stream = with_checksum(SAMPLE_TELEGRAM);
        stream.push_str(&with_checksum(second));

        let mut reader = reader_for(stream.into_bytes());
        assert_eq!(reader.next_frame().unwrap().version, "50");
        let frame = reader.next_frame().unwrap();
        assert_eq!(frame.version, "42");
        assert_eq!(frame.header, "XMX5LGBBFG1012463207");
        assert!(matches!(reader.next_frame(), Err(DsmrError::EndOfStream)));
    }

    #[test]
    fn test_slow_stream() {
        let stream = with_checksum(SAMPLE_TELEGRAM).into_bytes();
        let trickle = Trickle { data: Cursor::new(stream), chunk: 3 };
        let mut reader = Reader::new(BufReader::with_capacity(8, trickle));
        assert_eq!(reader.next_frame().unwrap().raw, SAMPLE_TELEGRAM);
    }

    #[test]
    fn test_from_read() {
        let stream = with_checksum(SAMPLE_TELEGRAM).into_bytes();
        let mut reader = Reader::from_read(Cursor::new(stream));
        assert!(reader.next_frame().is_ok());
    }

    #[test]
    fn test_empty_stream() {
        assert!(matches!(reader_for(Vec::new()).next_frame(), Err(DsmrError::EndOfStream)));
        assert!(matches!(reader_for(b"no header here".to_vec()).next_frame(), Err(DsmrError::EndOfStream)));
    }

    #[test]
    fn test_truncated_body() {
        let result = reader_for(b"/XMX5\r\n1-0:1.8.1(000001.000*kWh)\r\n".to_vec()).next_frame();
        assert!(matches!(result, Err(DsmrError::TruncatedFrame)));
    }

    #[test]
    fn test_truncated_checksum_line() {
        let result = reader_for(b"/XMX5\r\n1-3:0.2.8(50)\r\n!ABCD".to_vec()).next_frame();
        assert!(matches!(result, Err(DsmrError::TruncatedFrame)));
    }

    #[test]
    fn test_invalid_checksum_format() {
        for line in ["ABC\r\n", "ABCDEF\r\n", "XYZW\r\n", "\r\n"] {
            let stream = format!("/XMX5\r\n1-3:0.2.8(50)\r\n!{line}");
            let result = reader_for(stream.into_bytes()).next_frame();
            assert!(matches!(result, Err(DsmrError::InvalidChecksumFormat(_))), "{line:?}");
        }
    }

    #[test]
    fn test_checksum_mismatch() {
        let body = "/XMX5\r\n1-3:0.2.8(50)\r\n!";
        let good = checksum(body.as_bytes());
        let stream = format!("{body}{:04X}\r\n", good ^ 0x0001);
        match reader_for(stream.into_bytes()).next_frame() {
            Err(DsmrError::ChecksumMismatch { declared, computed }) => {
                assert_eq!(declared, good ^ 0x0001);
                assert_eq!(computed, good);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_any_single_bit_flip_is_detected() {
        let body = SAMPLE_TELEGRAM.as_bytes();
        let crc_line = format!("{:04X}\r\n", checksum(body));

        for pos in 1..body.len() - 1 {
            for bit in 0..8 {
                let mut corrupted = body.to_vec();
                corrupted[pos] ^= 1 << bit;
                if corrupted[pos] == END_MARKER {
                    continue;
                }
                corrupted.extend_from_slice(crc_line.as_bytes());

                let result = reader_for(corrupted).next_frame();
                assert!(
                    matches!(result, Err(DsmrError::ChecksumMismatch { .. })),
                    "flip of bit {bit} at {pos} not detected"
                );
            }
        }
    }

    #[test]
    fn test_resync_after_rejected_frame() {
        let bad = "/XMX5\r\n1-3:0.2.8(50)\r\n!0000\r\n";
        let mut stream = bad.to_string();
        stream.push_str(&with_checksum(SAMPLE_TELEGRAM));

        let mut reader = reader_for(stream.into_bytes());
        assert!(matches!(reader.next_frame(), Err(DsmrError::ChecksumMismatch { .. })));
        assert_eq!(reader.next_frame().unwrap().raw, SAMPLE_TELEGRAM);
    }

    #[test]
    fn test_resync_after_undecodable_frame() {
        let bad = with_checksum("/XMX5\r\n1-0:1.8.1(1*kWh*x)\r\n!");
        let mut stream = bad;
        stream.push_str(&with_checksum(SAMPLE_TELEGRAM));

        let mut reader = reader_for(stream.into_bytes());
        assert!(matches!(reader.next_frame(), Err(DsmrError::MalformedUnit(_))));
        assert!(reader.next_frame().is_ok());
    }

    #[test]
    fn test_latin1_bytes_are_preserved() {
        let body: Vec<u8> = b"/XMX5 \xE9\r\n0-0:96.13.0(caf\xE9)\r\n!".to_vec();
        let mut stream = body.clone();
        stream.extend_from_slice(format!("{:04X}\r\n", checksum(&body)).as_bytes());

        let frame = reader_for(stream).next_frame().unwrap();
        assert_eq!(frame.value("0-0:96.13.0").unwrap().data, "café");
        assert_eq!(frame.raw_bytes(), body);
    }

    #[test]
    fn test_iterator_yields_errors_and_ends_on_eof() {
        let mut stream = with_checksum(SAMPLE_TELEGRAM);
        stream.push_str("/XMX5\r\n1-3:0.2.8(50)\r\n!0000\r\n");
        stream.push_str(&with_checksum(SAMPLE_TELEGRAM));

        let results: Vec<_> = reader_for(stream.into_bytes()).collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(DsmrError::ChecksumMismatch { .. })));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_iterator_stops_after_fatal_error() {
        let mut reader = reader_for(b"/XMX5\r\n1-3:0.2.8(50)\r\n".to_vec());
        assert!(matches!(reader.next(), Some(Err(DsmrError::TruncatedFrame))));
        assert!(reader.next().is_none());
    }
}
