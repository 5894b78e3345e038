use std::sync::mpsc;
use std::time;

use crate::engine;
use crate::forecast;
use crate::model;
use crate::protocol;
use crate::serial;
use crate::util;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
    Closed,
}

/// What a single polling cycle did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cycle {
    /// The board had nothing to say.
    NoData,
    /// A line arrived but did not follow the humidity grammar.
    Unrecognised,
    Commanded(model::IrrigationCommand),
}

/// Drives the link: poll humidity, decide, answer with valve states, sleep, repeat.
pub struct Controller<P> {
    log: slog::Logger,
    engine: engine::IrrigationEngine,
    forecast: forecast::ForecastGate<P>,
    interval: time::Duration,
    state: LinkState,
}

impl<P> Controller<P>
where
    P: forecast::WeatherProvider,
{
    pub fn new(
        log: slog::Logger,
        engine: engine::IrrigationEngine,
        forecast: forecast::ForecastGate<P>,
        interval: time::Duration,
    ) -> Self {
        Controller {
            log,
            engine,
            forecast,
            interval,
            state: LinkState::Disconnected,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Opens the link through `connect` and polls until `shutdown` fires.  A failure to connect
    /// is returned as is; once connected, the link is closed on every way out of the loop.
    pub fn run<T, F>(
        &mut self,
        connect: F,
        shutdown: &mpsc::Receiver<()>,
    ) -> Result<(), failure::Error>
    where
        T: serial::Transport,
        F: FnOnce() -> Result<T, failure::Error>,
    {
        let mut transport = connect()?;

        self.state = LinkState::Connected;
        info!(self.log, "irrigation controller online";
              "zones" => self.engine.zone_ids().join(","),
              "interval_secs" => self.interval.as_secs());

        let result = self.poll(&mut transport, shutdown);

        transport.close();
        self.state = LinkState::Closed;

        result
    }

    fn poll<T>(
        &mut self,
        transport: &mut T,
        shutdown: &mpsc::Receiver<()>,
    ) -> Result<(), failure::Error>
    where
        T: serial::Transport,
    {
        loop {
            let now = chrono::Local::now().naive_local();
            self.cycle(transport, &now)?;

            if util::wait_for_shutdown(shutdown, self.interval) {
                info!(self.log, "shutdown requested, stopping");
                return Ok(());
            }
        }
    }

    pub fn cycle<T>(
        &mut self,
        transport: &mut T,
        now: &chrono::NaiveDateTime,
    ) -> Result<Cycle, failure::Error>
    where
        T: serial::Transport,
    {
        let rain_expected = self.forecast.evaluate(now);

        if transport.bytes_available()? == 0 {
            trace!(self.log, "no data from board");
            return Ok(Cycle::NoData);
        }

        let line = transport.read_line()?;
        let reading = match protocol::decode_line(&line, &self.engine.zone_ids()) {
            Some(reading) => reading,
            None => {
                let text = String::from_utf8_lossy(&line);
                debug!(self.log, "ignoring unrecognised line"; "line" => text.trim().to_owned());
                return Ok(Cycle::Unrecognised);
            }
        };

        let command = self.engine.decide(now, &reading, rain_expected);
        let wire = protocol::encode_command(&command);
        transport.write(wire.as_bytes())?;

        info!(self.log, "command sent";
              "command" => &wire,
              "master_pump" => if command.master_pump() { "ON" } else { "OFF" });

        Ok(Cycle::Commanded(command))
    }
}
