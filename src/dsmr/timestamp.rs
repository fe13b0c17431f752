use super::structs::{Season, Timestamp};
use super::DsmrError;
use chrono::{LocalResult, NaiveDate, TimeZone};
use chrono_tz::Europe::Amsterdam;

/* Two digit years below the pivot are 20xx, the rest 19xx (00-68 / 69-99) */
const CENTURY_PIVOT: u32 = 69;

/// Parses a meter timestamp: `YYMMDDhhmmss` followed by `S` or `W`.
///
/// A literal `0` is the meter's way of saying "no timestamp" and yields
/// [`Timestamp::Zero`].
///
/// The digits are local time in Europe/Amsterdam. During the autumn hour
/// that occurs twice the `S`/`W` marker decides which of the two instants is
/// meant; a local time that falls into the spring gap does not exist and is
/// rejected.
pub fn parse_timestamp(s: &str) -> Result<Timestamp, DsmrError> {
    if s == "0" {
        return Ok(Timestamp::Zero);
    }

    let invalid = || DsmrError::InvalidTimestampFormat(s.to_string());

    let season = s.chars().last().and_then(Season::from_marker).ok_or_else(invalid)?;
    let digits = &s[..s.len() - 1];
    if digits.len() != 12 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let field = |i: usize| -> u32 {
        let b = digits.as_bytes();
        ((b[i] - b'0') as u32) * 10 + (b[i + 1] - b'0') as u32
    };

    let yy = field(0);
    let year = if yy < CENTURY_PIVOT { 2000 + yy } else { 1900 + yy };

    let naive = NaiveDate::from_ymd_opt(year as i32, field(2), field(4))
        .and_then(|d| d.and_hms_opt(field(6), field(8), field(10)))
        .ok_or_else(invalid)?;

    let time = match Amsterdam.from_local_datetime(&naive) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(summer, winter) => match season {
            Season::Summer => summer,
            Season::Winter => winter,
        },
        LocalResult::None => return Err(invalid()),
    };

    Ok(Timestamp::At { time, season })
}
