use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// Daylight saving marker carried by every meter timestamp (`S` or `W`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Season {
    Summer,
    Winter,
}

impl Season {
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            'S' => Some(Season::Summer),
            'W' => Some(Season::Winter),
            _ => None,
        }
    }

    pub fn marker(&self) -> char {
        match self {
            Season::Summer => 'S',
            Season::Winter => 'W',
        }
    }
}

/// A meter timestamp in the meter's civil time zone.
///
/// `Zero` stands for "no timestamp" (the meter sends a literal `0`, or the
/// object simply carries none).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Timestamp {
    #[default]
    Zero,
    At { time: DateTime<Tz>, season: Season },
}

impl Timestamp {
    pub fn is_zero(&self) -> bool {
        matches!(self, Timestamp::Zero)
    }

    pub fn time(&self) -> Option<&DateTime<Tz>> {
        match self {
            Timestamp::Zero => None,
            Timestamp::At { time, .. } => Some(time),
        }
    }

    pub fn season(&self) -> Option<Season> {
        match self {
            Timestamp::Zero => None,
            Timestamp::At { season, .. } => Some(*season),
        }
    }

    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        self.time().map(|t| t.with_timezone(&Utc))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.time() {
            Some(time) => serializer.serialize_str(&time.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Value {
    /* Exactly as transmitted, leading zeros included */
    pub data: String,
    pub unit: String,
}

impl Value {
    pub fn new(data: &str, unit: &str) -> Self {
        Value {
            data: data.to_string(),
            unit: unit.to_string(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.data.parse::<f64>().ok()
    }
}

/// One decoded telegram line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Object {
    pub id: String,
    pub value: Value,
    /// Only set for the two value form `id(timestamp)(value)`.
    pub time: Timestamp,
}

/// A checksum verified and fully decoded telegram.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Frame {
    pub header: String,
    pub version: String,
    pub equipment_id: String,
    pub time: Timestamp,
    /// Telegram text from `/` up to and including `!`.
    pub raw: String,
    pub objects: HashMap<String, Object>,
}

impl Frame {
    /// The telegram bytes exactly as received (the text is Latin-1).
    pub fn raw_bytes(&self) -> Vec<u8> {
        self.raw.chars().map(|c| c as u32 as u8).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Object> {
        self.objects.get(id)
    }

    pub fn value(&self, id: &str) -> Option<&Value> {
        self.objects.get(id).map(|o| &o.value)
    }

    /// The time a reading belongs to: the object's own timestamp when it
    /// carries one, otherwise the telegram timestamp.
    pub fn effective_time(&self, id: &str) -> Timestamp {
        match self.objects.get(id) {
            Some(obj) if !obj.time.is_zero() => obj.time.clone(),
            Some(_) => self.time.clone(),
            None => Timestamp::Zero,
        }
    }
}
