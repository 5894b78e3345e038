extern crate chrono;
extern crate ctrlc;
#[macro_use]
extern crate failure;
extern crate reqwest;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
extern crate serialport;
#[macro_use]
extern crate slog;
extern crate slog_async;
extern crate slog_envlogger;
extern crate slog_scope;
extern crate slog_stdlog;
extern crate slog_term;
extern crate structopt;

use std::env;
use std::path;
use std::process;
use std::sync::mpsc;

use slog::Drain;
use structopt::StructOpt;

pub mod config;
pub mod controller;
pub mod engine;
pub mod forecast;
pub mod model;
pub mod protocol;
pub mod schedule;
pub mod serial;
pub mod util;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "irrigation",
    about = "Waters garden zones from soil humidity readings and the rain forecast."
)]
struct Options {
    /// TOML configuration file.
    #[structopt(short, long, default_value = "irrigation.toml", parse(from_os_str))]
    config: path::PathBuf,

    /// Serial port of the sensor board, overriding the configuration file.
    #[structopt(short, long)]
    port: Option<String>,
}

fn main() {
    let options = Options::from_args();
    let log = build_logger();

    let code = {
        let _scope_guard = slog_scope::set_global_logger(log.clone());
        if let Err(e) = slog_stdlog::init() {
            warn!(log, "could not route dependency logs"; "error" => %e);
        }

        match run(&log, options) {
            Ok(()) => 0,
            Err(e) => {
                crit!(log, "irrigation controller stopped"; "error" => describe(&e));
                1
            }
        }
    };

    drop(log);
    process::exit(code);
}

fn run(log: &slog::Logger, options: Options) -> Result<(), failure::Error> {
    let mut config = config::Config::load(&options.config)?;
    if let Some(port) = options.port {
        config.serial.port = port;
    }

    for warning in config.warnings() {
        warn!(log, "zone misconfigured"; "detail" => warning);
    }

    let provider = forecast::Weatherbit::new(&config.weather)?;
    let forecast = forecast::ForecastGate::new(
        log.new(o!("component" => "forecast")),
        provider,
        config.weather.rain_threshold,
        config.weather.refresh_interval(),
    );
    let engine =
        engine::IrrigationEngine::new(log.new(o!("component" => "engine")), config.zones());
    let mut controller = controller::Controller::new(
        log.new(o!("component" => "controller")),
        engine,
        forecast,
        config.loop_interval(),
    );

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })?;

    let serial_log = log.new(o!("component" => "serial"));
    controller.run(
        || serial::SerialLink::open(serial_log, &config.serial),
        &shutdown_rx,
    )
}

fn build_logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::LogBuilder::new(drain)
        .filter(None, slog::FilterLevel::Info)
        .parse(&env::var("RUST_LOG").unwrap_or_default())
        .build();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")))
}

fn describe(error: &failure::Error) -> String {
    error
        .iter_chain()
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}
