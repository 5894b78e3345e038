use chrono::Datelike;
use chrono::Timelike;

use crate::model;

/// Whether the zone's scheduled window is open at `now`.
///
/// A frequency above one is a calendar rule, not a rolling interval: the window only opens on
/// days of the month where `day % frequency_days == 1`.  With a frequency of 3 that is the 1st,
/// 4th, 7th and so on, restarting every month regardless of how the previous month ended.
pub fn in_window(now: &chrono::NaiveDateTime, zone: &model::ZoneConfig) -> bool {
    match zone.frequency_days {
        0 => false,
        1 => zone.window.contains(minute_of_day(now)),
        n => now.day() % n == 1 && zone.window.contains(minute_of_day(now)),
    }
}

fn minute_of_day(now: &chrono::NaiveDateTime) -> u16 {
    (now.hour() * 60 + now.minute()) as u16
}
