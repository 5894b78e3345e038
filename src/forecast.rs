use std::time;

use failure::Fail;

use crate::config;

pub const WEATHERBIT_DAILY_URL: &str = "https://api.weatherbit.io/v2.0/forecast/daily";

#[derive(Debug, Fail)]
pub enum ForecastError {
    #[fail(display = "weather request failed: {}", _0)]
    Request(#[cause] reqwest::Error),
    #[fail(display = "weather provider answered with HTTP status {}", _0)]
    Status(u16),
    #[fail(display = "malformed forecast response: {}", _0)]
    Malformed(String),
}

/// A source of today's precipitation forecast.
pub trait WeatherProvider {
    /// Probability of precipitation for today, in percent (0-100).
    fn todays_precipitation_probability(&self) -> Result<f64, ForecastError>;
}

impl<'a, P> WeatherProvider for &'a P
where
    P: WeatherProvider + ?Sized,
{
    fn todays_precipitation_probability(&self) -> Result<f64, ForecastError> {
        (**self).todays_precipitation_probability()
    }
}

/// Daily forecast client for the Weatherbit API.
pub struct Weatherbit {
    client: reqwest::blocking::Client,
    url: String,
    city: String,
    country: String,
    api_key: String,
}

impl Weatherbit {
    pub fn new(weather: &config::Weather) -> Result<Self, failure::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(time::Duration::from_secs(weather.timeout_secs))
            .build()?;

        Ok(Weatherbit {
            client,
            url: weather.base_url.clone(),
            city: weather.city.clone(),
            country: weather.country.clone(),
            api_key: weather.api_key.clone(),
        })
    }
}

impl WeatherProvider for Weatherbit {
    fn todays_precipitation_probability(&self) -> Result<f64, ForecastError> {
        let response = self
            .client
            .get(self.url.as_str())
            .query(&[
                ("city", &self.city),
                ("country", &self.country),
                ("key", &self.api_key),
            ])
            .send()
            .map_err(ForecastError::Request)?;

        if !response.status().is_success() {
            return Err(ForecastError::Status(response.status().as_u16()));
        }

        let body = response.text().map_err(ForecastError::Request)?;
        parse_daily_forecast(&body)
    }
}

#[derive(Debug, Deserialize)]
struct DailyForecast {
    data: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DailyEntry {
    #[serde(default)]
    pop: Option<f64>,
}

/// Extracts `data[0].pop` from a daily forecast body.  A missing or null `pop` counts as 0; a
/// missing `data` list or an empty one is malformed.  Later days are never looked at.
pub fn parse_daily_forecast(body: &str) -> Result<f64, ForecastError> {
    let forecast: DailyForecast =
        serde_json::from_str(body).map_err(|e| ForecastError::Malformed(e.to_string()))?;

    let today = forecast
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ForecastError::Malformed("no forecast for today".to_owned()))?;
    let today: DailyEntry =
        serde_json::from_value(today).map_err(|e| ForecastError::Malformed(e.to_string()))?;

    Ok(today.pop.unwrap_or(0.0))
}

/// The cached rain verdict and when it was computed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RainVerdict {
    pub expected: bool,
    pub computed_at: Option<chrono::NaiveDateTime>,
    /// Probability of precipitation as a fraction, when known.
    pub probability: Option<f64>,
    pub threshold: f64,
}

#[derive(Debug)]
pub enum Refresh {
    /// The last query is recent enough; nothing was asked.
    Cached,
    Refreshed,
    /// The query failed; the previous verdict stands and the next call retries.
    Failed(ForecastError),
}

/// Stale-or-refresh state machine behind the forecast gate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForecastState {
    last_query: Option<chrono::NaiveDateTime>,
    verdict: RainVerdict,
}

impl ForecastState {
    pub fn new(threshold: f64) -> Self {
        ForecastState {
            last_query: None,
            verdict: RainVerdict {
                expected: false,
                computed_at: None,
                probability: None,
                threshold,
            },
        }
    }

    pub fn verdict(&self) -> &RainVerdict {
        &self.verdict
    }

    pub fn last_query(&self) -> Option<chrono::NaiveDateTime> {
        self.last_query
    }

    /// Queries through `query` unless the last successful query happened less than `interval`
    /// before `now`.  Only a successful query moves the state.
    pub fn advance<F>(
        &mut self,
        now: chrono::NaiveDateTime,
        interval: chrono::Duration,
        threshold: f64,
        query: F,
    ) -> Refresh
    where
        F: FnOnce() -> Result<f64, ForecastError>,
    {
        if let Some(last_query) = self.last_query {
            if now.signed_duration_since(last_query) < interval {
                return Refresh::Cached;
            }
        }

        match query() {
            Ok(percent) => {
                let probability = percent / 100.0;
                self.verdict = RainVerdict {
                    expected: probability > threshold,
                    computed_at: Some(now),
                    probability: Some(probability),
                    threshold,
                };
                self.last_query = Some(now);
                Refresh::Refreshed
            }
            Err(e) => Refresh::Failed(e),
        }
    }
}

/// Answers "is rain expected today", asking the provider at most once per refresh interval.
pub struct ForecastGate<P> {
    log: slog::Logger,
    provider: P,
    threshold: f64,
    refresh_interval: chrono::Duration,
    state: ForecastState,
}

impl<P> ForecastGate<P>
where
    P: WeatherProvider,
{
    pub fn new(
        log: slog::Logger,
        provider: P,
        threshold: f64,
        refresh_interval: chrono::Duration,
    ) -> Self {
        ForecastGate {
            log,
            provider,
            threshold,
            refresh_interval,
            state: ForecastState::new(threshold),
        }
    }

    pub fn verdict(&self) -> &RainVerdict {
        self.state.verdict()
    }

    pub fn evaluate(&mut self, now: &chrono::NaiveDateTime) -> bool {
        let log = &self.log;
        let provider = &self.provider;
        let refresh = self
            .state
            .advance(*now, self.refresh_interval, self.threshold, || {
                debug!(log, "querying weather provider");
                provider.todays_precipitation_probability()
            });

        let verdict = *self.state.verdict();
        match refresh {
            Refresh::Cached => {
                trace!(self.log, "reusing cached rain verdict"; "expected" => verdict.expected);
            }
            Refresh::Refreshed => {
                let probability = format!("{:.2}", verdict.probability.unwrap_or(0.0));
                if verdict.expected {
                    info!(self.log, "rain expected, irrigation blocked";
                          "probability" => probability, "threshold" => verdict.threshold);
                } else {
                    info!(self.log, "clear forecast";
                          "probability" => probability, "threshold" => verdict.threshold);
                }
            }
            Refresh::Failed(e) => {
                warn!(self.log, "could not refresh forecast, keeping last verdict";
                      "error" => %e, "expected" => verdict.expected);
            }
        }

        verdict.expected
    }
}
