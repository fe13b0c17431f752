use super::meter_definitions::{get_obis_description, EQUIPMENT_ID, TIMESTAMP_ID, VERSION_ID};
use super::obis_parser::parse_obis_line;
use super::structs::Frame;
use super::timestamp::parse_timestamp;
use super::DsmrError;
use log::debug;

pub const LINE_END: &str = "\r\n";

/// Decodes a checksum verified telegram (`/` up to and including `!`).
///
/// Either every data line parses and a complete [`Frame`] is returned, or
/// the first failing line aborts the whole decode. Data lines that repeat an
/// object identifier replace the earlier object, and the top level fields
/// follow the last occurrence as well.
pub fn decode_frame(raw: &str) -> Result<Frame, DsmrError> {
    let mut frame = Frame {
        raw: raw.to_string(),
        ..Default::default()
    };

    for line in raw.split(LINE_END) {
        if line.is_empty() || line.starts_with('!') {
            continue;
        }

        if let Some(header) = line.strip_prefix('/') {
            frame.header = header.to_string();
            continue;
        }

        let obj = parse_obis_line(line)?;
        match obj.id.as_str() {
            VERSION_ID => frame.version = obj.value.data.clone(),
            TIMESTAMP_ID => {
                if !obj.value.data.is_empty() {
                    frame.time = parse_timestamp(&obj.value.data)?;
                }
            }
            EQUIPMENT_ID => frame.equipment_id = obj.value.data.clone(),
            _ => {}
        }
        if let Some(description) = get_obis_description(&obj.id) {
            debug!("{}: {} = {}", obj.id, description, obj.value.data);
        }
        frame.objects.insert(obj.id.clone(), obj);
    }

    debug!("Decoded DSMR frame '{}' with {} objects", frame.header, frame.objects.len());
    Ok(frame)
}
