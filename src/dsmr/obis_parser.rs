use super::structs::{Object, Timestamp, Value};
use super::timestamp::parse_timestamp;
use super::DsmrError;

pub fn parse_obis_line(line: &str) -> Result<Object, DsmrError> {
    // Example formats:
    // 1-0:1.8.1(000123.456*kWh)
    // 0-0:96.1.1(4B384547303034303436333935353037)
    // 0-1:24.2.1(101209112500W)(12785.123*m3)

    let paren_start = line.find('(')
        .ok_or_else(|| DsmrError::MissingValues(line.to_string()))?;

    let id = &line[..paren_start];

    let mut values: Vec<Value> = Vec::with_capacity(2);
    for group in line[paren_start..].split('(') {
        if group.is_empty() {
            continue;
        }

        let content = group.strip_suffix(')')
            .ok_or_else(|| DsmrError::MalformedValue(line.to_string()))?;

        let parts: Vec<&str> = content.split('*').collect();
        match parts.as_slice() {
            [data] => values.push(Value::new(data, "")),
            [data, unit] => values.push(Value::new(data, unit)),
            _ => return Err(DsmrError::MalformedUnit(line.to_string())),
        }
    }

    let (time, value) = match values.len() {
        1 => (Timestamp::Zero, values.remove(0)),
        2 => {
            let value = values.remove(1);
            (parse_timestamp(&values[0].data)?, value)
        }
        _ => return Err(DsmrError::UnsupportedValueCount(line.to_string())),
    };

    Ok(Object {
        id: id.to_string(),
        value,
        time,
    })
}
