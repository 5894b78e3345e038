//! Line protocol spoken with the sensor/valve microcontroller.
//!
//! Inbound, the board prints one humidity line per sample with the zones in wire order:
//!
//! ```text
//! H1:52|H2:47|H3:30
//! ```
//!
//! Outbound, we answer with one ASCII digit per zone in the same order, `1` to open the valve and
//! `0` to close it, with no separator and no terminator (`"101"`).  The firmware reads that string
//! positionally, so zone order and count are part of the wire contract.

use std::str;

use crate::model;

const FIELD_SEPARATOR: char = '|';
const VALUE_SEPARATOR: char = ':';

/// Decodes raw bytes from the link into a reading.  Surrounding whitespace is tolerated; a line
/// with any invalid UTF-8, or that does not follow the grammar, yields `None`.
pub fn decode_line<S>(raw: &[u8], zone_ids: &[S]) -> Option<model::HumidityReading>
where
    S: AsRef<str>,
{
    let line = str::from_utf8(raw).ok()?;
    parse_line(line.trim(), zone_ids)
}

/// Parses `<id>:<digits>` fields separated by `|`, one per zone in the given order.
///
/// The match is anchored at the start of the line only: whatever follows the digits of the last
/// zone is ignored.  Values too large for a `u32` saturate.
pub fn parse_line<S>(line: &str, zone_ids: &[S]) -> Option<model::HumidityReading>
where
    S: AsRef<str>,
{
    let mut reading = model::HumidityReading::default();
    let mut rest = line;

    for (index, zone_id) in zone_ids.iter().enumerate() {
        let zone_id = zone_id.as_ref();

        if index > 0 {
            rest = rest.strip_prefix(FIELD_SEPARATOR)?;
        }

        rest = rest.strip_prefix(zone_id)?.strip_prefix(VALUE_SEPARATOR)?;

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }

        let value = rest[..digits].bytes().fold(0u32, |acc, digit| {
            acc.saturating_mul(10)
                .saturating_add(u32::from(digit - b'0'))
        });

        reading.insert(zone_id, value);
        rest = &rest[digits..];
    }

    Some(reading)
}

pub fn encode_command(command: &model::IrrigationCommand) -> String {
    command
        .valves()
        .iter()
        .map(|&open| if open { '1' } else { '0' })
        .collect()
}
