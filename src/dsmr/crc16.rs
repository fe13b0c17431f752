use ::crc16::{State, ARC};

/* CRC-16/ARC: reflected polynomial 0xA001, init 0x0000, no final xor */
pub fn checksum(data: &[u8]) -> u16 {
    State::<ARC>::calculate(data)
}

/// Decodes the checksum line that follows the `!` marker.
///
/// The line must hold exactly two bytes of hex (four digits, big endian)
/// once the surrounding whitespace and CRLF are trimmed.
pub fn parse_checksum_line(line: &str) -> Option<u16> {
    let bytes = hex::decode(line.trim()).ok()?;
    match bytes.as_slice() {
        [hi, lo] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}
