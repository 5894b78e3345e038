use std::collections;
use std::fmt;
use std::str;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// A daily clock interval, stored as minutes since midnight.  `start` is inclusive and `end` is
/// exclusive; windows never wrap across midnight, so a window with `start >= end` never matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub start: u16,
    pub end: u16,
}

impl Window {
    pub fn new(start_hour: u16, start_minute: u16, end_hour: u16, end_minute: u16) -> Self {
        Window {
            start: start_hour * 60 + start_minute,
            end: end_hour * 60 + end_minute,
        }
    }

    pub fn contains(&self, minute_of_day: u16) -> bool {
        self.start <= minute_of_day && minute_of_day < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

impl str::FromStr for Window {
    type Err = failure::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts = raw.split('-').collect::<Vec<_>>();

        if parts.len() != 2 {
            bail!("expected two times separated by a dash, like \"07:00-07:15\"");
        }

        let start = parse_clock(parts[0].trim())?;
        let end = parse_clock(parts[1].trim())?;

        if start >= MINUTES_PER_DAY {
            bail!("window cannot start at {}", parts[0].trim());
        }

        Ok(Window { start, end })
    }
}

fn parse_clock(raw: &str) -> Result<u16, failure::Error> {
    let parts = raw.split(':').collect::<Vec<_>>();

    if parts.len() != 2 {
        bail!("expected a time like \"21:30\", got {:?}", raw);
    }

    let hour = parts[0]
        .parse::<u16>()
        .map_err(|e| format_err!("invalid hour {:?}: {}", parts[0], e))?;
    let minute = parts[1]
        .parse::<u16>()
        .map_err(|e| format_err!("invalid minute {:?}: {}", parts[1], e))?;

    if minute >= 60 {
        bail!("minute out of range in {:?}", raw);
    }

    let minutes = hour
        .checked_mul(60)
        .and_then(|m| m.checked_add(minute))
        .filter(|&m| m <= MINUTES_PER_DAY)
        .ok_or_else(|| format_err!("time out of range in {:?}", raw))?;

    Ok(minutes)
}

/// Static configuration of one valve/sensor pair.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneConfig {
    pub id: String,
    pub name: String,
    pub min_humidity: u32,
    pub max_humidity: u32,
    pub window: Window,
    /// 0 disables the zone, 1 runs it daily, N > 1 runs it on days where `day % N == 1`.
    pub frequency_days: u32,
}

/// One parsed snapshot of soil humidity, keyed by zone id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HumidityReading {
    values: collections::HashMap<String, u32>,
}

impl HumidityReading {
    pub fn insert<S>(&mut self, zone_id: S, percent: u32)
    where
        S: Into<String>,
    {
        self.values.insert(zone_id.into(), percent);
    }

    pub fn get(&self, zone_id: &str) -> Option<u32> {
        self.values.get(zone_id).cloned()
    }
}

/// Per-zone valve states in configured zone order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrrigationCommand {
    valves: Vec<bool>,
}

impl IrrigationCommand {
    pub fn new(valves: Vec<bool>) -> Self {
        IrrigationCommand { valves }
    }

    pub fn valves(&self) -> &[bool] {
        &self.valves
    }

    /// The master pump runs whenever any valve is open.
    pub fn master_pump(&self) -> bool {
        self.valves.iter().any(|&open| open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_bounds_are_half_open() {
        let window = Window::new(7, 0, 7, 15);
        assert!(!window.contains(6 * 60 + 59));
        assert!(window.contains(7 * 60));
        assert!(window.contains(7 * 60 + 14));
        assert!(!window.contains(7 * 60 + 15));
    }

    #[test]
    fn window_parses_and_displays() {
        let window: Window = "21:00-22:00".parse().unwrap();
        assert_eq!(window, Window::new(21, 0, 22, 0));
        assert_eq!(window.to_string(), "21:00-22:00");
    }

    #[test]
    fn window_may_end_at_midnight() {
        let window: Window = "23:30-24:00".parse().unwrap();
        assert_eq!(window.end, MINUTES_PER_DAY);
        assert!(window.contains(23 * 60 + 59));
    }

    #[test]
    fn window_rejects_garbage() {
        assert!("07:00".parse::<Window>().is_err());
        assert!("07:60-08:00".parse::<Window>().is_err());
        assert!("24:00-24:00".parse::<Window>().is_err());
        assert!("07:00-24:01".parse::<Window>().is_err());
        assert!("7h-8h".parse::<Window>().is_err());
    }

    #[test]
    fn empty_window_never_matches() {
        let window: Window = "00:00-00:00".parse().unwrap();
        assert!(window.is_empty());
        assert!((0..MINUTES_PER_DAY).all(|m| !window.contains(m)));
    }

    #[test]
    fn master_pump_follows_valves() {
        assert!(IrrigationCommand::new(vec![false, true, false]).master_pump());
        assert!(!IrrigationCommand::new(vec![false, false, false]).master_pump());
    }
}
