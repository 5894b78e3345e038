use crate::model;
use crate::schedule;

/// The rule that settled a zone's valve state in one decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
    /// Humidity below the zone minimum; irrigate no matter what.
    Critical,
    /// Scheduled, but rain is expected today.
    CancelledRain,
    /// Scheduled, but the soil is already above the zone maximum.
    CancelledMax,
    Scheduled,
    /// Outside the zone's schedule.
    Idle,
    /// The reading carried no value for this zone.
    NoReading,
}

impl Rule {
    pub fn opens_valve(self) -> bool {
        match self {
            Rule::Critical | Rule::Scheduled => true,
            Rule::CancelledRain | Rule::CancelledMax | Rule::Idle | Rule::NoReading => false,
        }
    }
}

/// Decides a single zone.  Emergency irrigation wins over everything, rain wins over a merely
/// scheduled run, and the maximum threshold prevents overwatering inside the window.
pub fn evaluate_zone(
    now: &chrono::NaiveDateTime,
    zone: &model::ZoneConfig,
    humidity: Option<u32>,
    rain_expected: bool,
) -> Rule {
    let humidity = match humidity {
        Some(humidity) => humidity,
        None => return Rule::NoReading,
    };

    if humidity < zone.min_humidity {
        Rule::Critical
    } else if !schedule::in_window(now, zone) {
        Rule::Idle
    } else if rain_expected {
        Rule::CancelledRain
    } else if humidity > zone.max_humidity {
        Rule::CancelledMax
    } else {
        Rule::Scheduled
    }
}

pub struct IrrigationEngine {
    log: slog::Logger,
    zones: Vec<model::ZoneConfig>,
}

impl IrrigationEngine {
    pub fn new(log: slog::Logger, zones: Vec<model::ZoneConfig>) -> Self {
        IrrigationEngine { log, zones }
    }

    pub fn zone_ids(&self) -> Vec<&str> {
        self.zones.iter().map(|zone| zone.id.as_str()).collect()
    }

    /// Produces one valve state per configured zone, in configured order.
    pub fn decide(
        &self,
        now: &chrono::NaiveDateTime,
        readings: &model::HumidityReading,
        rain_expected: bool,
    ) -> model::IrrigationCommand {
        info!(self.log, "humidity snapshot";
              "time" => %now.format("%H:%M:%S"),
              "humidity" => self.snapshot(readings));

        let valves = self
            .zones
            .iter()
            .map(|zone| {
                let humidity = readings.get(&zone.id);
                let rule = evaluate_zone(now, zone, humidity, rain_expected);
                self.report(zone, humidity, rule);
                rule.opens_valve()
            })
            .collect();

        model::IrrigationCommand::new(valves)
    }

    fn snapshot(&self, readings: &model::HumidityReading) -> String {
        self.zones
            .iter()
            .map(|zone| match readings.get(&zone.id) {
                Some(humidity) => format!("{}:{}%", zone.id, humidity),
                None => format!("{}:-", zone.id),
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn report(&self, zone: &model::ZoneConfig, humidity: Option<u32>, rule: Rule) {
        let log = self.log.new(o!("zone" => zone.name.clone()));
        match rule {
            Rule::Critical => warn!(log, "critical humidity, emergency irrigation ON";
                                    "humidity" => humidity, "min" => zone.min_humidity),
            Rule::CancelledRain => info!(log, "irrigation cancelled, rain expected"),
            Rule::CancelledMax => info!(log, "irrigation cancelled, humidity above maximum";
                                        "humidity" => humidity, "max" => zone.max_humidity),
            Rule::Scheduled => info!(log, "scheduled irrigation OK"; "window" => %zone.window),
            Rule::Idle => info!(log, "no irrigation scheduled"),
            Rule::NoReading => warn!(log, "no humidity value for zone, valve stays closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn discard() -> slog::Logger {
        slog::Logger::root(slog::Discard, o!())
    }

    fn at(day: u32, hour: u32, minute: u32) -> chrono::NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 5, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .unwrap()
    }

    fn zone(id: &str, min: u32, max: u32, window: &str, frequency_days: u32) -> model::ZoneConfig {
        model::ZoneConfig {
            id: id.to_owned(),
            name: id.to_owned(),
            min_humidity: min,
            max_humidity: max,
            window: window.parse().unwrap(),
            frequency_days,
        }
    }

    fn default_zones() -> Vec<model::ZoneConfig> {
        vec![
            zone("H1", 35, 60, "07:00-07:15", 1),
            zone("H2", 40, 70, "21:00-22:00", 3),
            zone("H3", 30, 50, "00:00-00:00", 0),
        ]
    }

    fn reading(values: &[(&str, u32)]) -> model::HumidityReading {
        let mut reading = model::HumidityReading::default();
        for &(id, value) in values {
            reading.insert(id, value);
        }
        reading
    }

    #[test]
    fn scheduled_zone_waters_without_rain() {
        let front = zone("H1", 35, 60, "07:00-07:15", 1);
        assert_eq!(evaluate_zone(&at(10, 7, 5), &front, Some(50), false), Rule::Scheduled);
        assert_eq!(evaluate_zone(&at(10, 7, 5), &front, Some(50), true), Rule::CancelledRain);
    }

    #[test]
    fn emergency_outside_window() {
        let front = zone("H1", 35, 60, "07:00-07:15", 1);
        assert_eq!(evaluate_zone(&at(10, 3, 0), &front, Some(30), true), Rule::Critical);
    }

    #[test]
    fn emergency_on_disabled_zone() {
        let inner = zone("H3", 30, 50, "00:00-00:00", 0);
        assert_eq!(evaluate_zone(&at(2, 12, 0), &inner, Some(29), false), Rule::Critical);
        assert_eq!(evaluate_zone(&at(2, 12, 0), &inner, Some(30), false), Rule::Idle);
    }

    #[test]
    fn max_threshold_suppresses_scheduled_run() {
        let front = zone("H1", 35, 60, "07:00-07:15", 1);
        assert_eq!(evaluate_zone(&at(10, 7, 5), &front, Some(61), false), Rule::CancelledMax);
        assert_eq!(evaluate_zone(&at(10, 7, 5), &front, Some(60), false), Rule::Scheduled);
    }

    #[test]
    fn rain_is_checked_before_max() {
        let front = zone("H1", 35, 60, "07:00-07:15", 1);
        assert_eq!(evaluate_zone(&at(10, 7, 5), &front, Some(80), true), Rule::CancelledRain);
    }

    #[test]
    fn inverted_thresholds_degrade_to_emergency_only() {
        let broken = zone("H1", 60, 35, "07:00-07:15", 1);
        for humidity in 0..=100 {
            let rule = evaluate_zone(&at(10, 7, 5), &broken, Some(humidity), false);
            assert_ne!(rule, Rule::Scheduled, "humidity {}", humidity);
            assert_eq!(rule.opens_valve(), humidity < 60);
        }
    }

    #[test]
    fn missing_value_keeps_valve_closed() {
        let front = zone("H1", 35, 60, "07:00-07:15", 1);
        assert_eq!(evaluate_zone(&at(10, 7, 5), &front, None, false), Rule::NoReading);
    }

    #[test]
    fn decide_keeps_configured_order() {
        let engine = IrrigationEngine::new(discard(), default_zones());
        // Day 4 satisfies the frequency-3 residue, 21:30 is inside H2's window.
        let command = engine.decide(
            &at(4, 21, 30),
            &reading(&[("H1", 20), ("H2", 50), ("H3", 40)]),
            false,
        );
        assert_eq!(command.valves(), &[true, true, false]);
        assert!(command.master_pump());
    }

    #[test]
    fn decide_all_closed_turns_pump_off() {
        let engine = IrrigationEngine::new(discard(), default_zones());
        let command = engine.decide(
            &at(5, 12, 0),
            &reading(&[("H1", 50), ("H2", 50), ("H3", 40)]),
            false,
        );
        assert_eq!(command.valves(), &[false, false, false]);
        assert!(!command.master_pump());
    }

    fn arb_now() -> impl Strategy<Value = chrono::NaiveDateTime> {
        (1u32..=31, 0u32..24, 0u32..60).prop_map(|(day, hour, minute)| at(day, hour, minute))
    }

    proptest! {
        #[test]
        fn decide_is_deterministic(
            now in arb_now(),
            h1 in 0u32..=120,
            h2 in 0u32..=120,
            h3 in 0u32..=120,
            rain in any::<bool>(),
        ) {
            let engine = IrrigationEngine::new(discard(), default_zones());
            let readings = reading(&[("H1", h1), ("H2", h2), ("H3", h3)]);
            let first = engine.decide(&now, &readings, rain);
            let second = engine.decide(&now, &readings, rain);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn below_minimum_always_waters(
            now in arb_now(),
            min in 1u32..=100,
            max in 0u32..=100,
            frequency_days in 0u32..=5,
            rain in any::<bool>(),
        ) {
            let target = zone("H1", min, max, "07:00-07:15", frequency_days);
            let rule = evaluate_zone(&now, &target, Some(min - 1), rain);
            prop_assert_eq!(rule, Rule::Critical);
        }

        #[test]
        fn disabled_zone_only_waters_in_emergency(
            now in arb_now(),
            humidity in 30u32..=100,
            rain in any::<bool>(),
        ) {
            let inner = zone("H3", 30, 50, "00:00-24:00", 0);
            prop_assert_eq!(evaluate_zone(&now, &inner, Some(humidity), rain), Rule::Idle);
        }
    }
}
