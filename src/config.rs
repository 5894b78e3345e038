use std::collections;
use std::path;
use std::time;

use crate::forecast;
use crate::model;

/// Environment variables with this prefix override file settings, using `__` to reach nested
/// keys (`IRRIGATION_WEATHER__API_KEY`).
pub const ENV_PREFIX: &str = "IRRIGATION";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_loop_interval_secs")]
    pub loop_interval_secs: u64,
    pub weather: Weather,
    pub serial: Serial,
    /// Zones in wire order.
    pub zone: Vec<Zone>,
}

#[derive(Debug, Deserialize)]
pub struct Weather {
    pub api_key: String,
    pub city: String,
    pub country: String,
    /// Probability of precipitation (0.0-1.0) above which rain is expected.
    #[serde(default = "default_rain_threshold")]
    pub rain_threshold: f64,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct Serial {
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub min: u32,
    pub max: u32,
    #[serde(deserialize_with = "deserialize_window")]
    pub window: model::Window,
    pub frequency_days: u32,
}

fn default_loop_interval_secs() -> u64 {
    5
}

fn default_rain_threshold() -> f64 {
    0.70
}

fn default_refresh_interval_secs() -> u64 {
    60 * 60
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_base_url() -> String {
    forecast::WEATHERBIT_DAILY_URL.to_owned()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_read_timeout_ms() -> u64 {
    100
}

fn default_settle_ms() -> u64 {
    2000
}

impl Config {
    pub fn load(file: &path::Path) -> Result<Self, failure::Error> {
        let mut settings = ::config::Config::new();
        settings.merge(::config::File::from(file).format(::config::FileFormat::Toml))?;
        settings.merge(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))?;

        let config: Config = settings
            .try_into()
            .map_err(|e| format_err!("invalid configuration in {}: {}", file.display(), e))?;
        config.validate()?;

        Ok(config)
    }

    /// Rejects settings the controller cannot run with.  Zones that are merely useless (inverted
    /// thresholds, empty windows) pass; see `warnings`.
    pub fn validate(&self) -> Result<(), failure::Error> {
        if self.loop_interval_secs == 0 {
            bail!("loop_interval_secs must be at least 1");
        }

        let threshold = self.weather.rain_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            bail!("weather.rain_threshold must be a fraction between 0 and 1, got {}", threshold);
        }

        if self.weather.refresh_interval_secs == 0 {
            bail!("weather.refresh_interval_secs must be at least 1");
        }

        if self.zone.is_empty() {
            bail!("at least one [[zone]] must be configured");
        }

        let mut seen = collections::HashSet::new();
        for zone in &self.zone {
            if zone.id.is_empty() {
                bail!("zone {:?} has an empty id", zone.name);
            }
            if zone.id.contains(|c: char| c == ':' || c == '|' || char::is_whitespace(c)) {
                bail!("zone id {:?} may not contain ':', '|' or whitespace", zone.id);
            }
            if !seen.insert(zone.id.as_str()) {
                bail!("zone id {:?} is configured twice", zone.id);
            }
        }

        Ok(())
    }

    /// Human-readable notes about zones that can never run on schedule.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for zone in &self.zone {
            if zone.min > zone.max {
                warnings.push(format!(
                    "zone {} has min {}% above max {}%, it will only water in emergencies",
                    zone.id, zone.min, zone.max
                ));
            }
            if zone.frequency_days != 0 && zone.window.is_empty() {
                warnings.push(format!(
                    "zone {} has an empty window {}, it will only water in emergencies",
                    zone.id, zone.window
                ));
            }
        }

        warnings
    }

    pub fn zones(&self) -> Vec<model::ZoneConfig> {
        self.zone
            .iter()
            .map(|zone| model::ZoneConfig {
                id: zone.id.clone(),
                name: zone.name.clone(),
                min_humidity: zone.min,
                max_humidity: zone.max,
                window: zone.window,
                frequency_days: zone.frequency_days,
            })
            .collect()
    }

    pub fn loop_interval(&self) -> time::Duration {
        time::Duration::from_secs(self.loop_interval_secs)
    }
}

impl Weather {
    pub fn refresh_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_interval_secs as i64)
    }
}

fn deserialize_window<'de, D>(deserializer: D) -> Result<model::Window, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = <String as serde::Deserialize>::deserialize(deserializer)?;

    raw.parse::<model::Window>().map_err(|e| {
        serde::de::Error::invalid_value(
            serde::de::Unexpected::Str(&raw),
            &format!("a daily window like \"07:00-07:15\" ({})", e).as_str(),
        )
    })
}
