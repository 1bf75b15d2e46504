//! Tracing setup shared by the binaries

use std::fs::OpenOptions;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::filter::{EnvFilter, ParseError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer, Registry};

use crate::config::LoggingConfig;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("Cannot open log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Subscriber already installed: {0}")]
    Init(String),
}

/// Filter directives for a configured level; `RUST_LOG` wins when set
pub fn filter_directives(config: &LoggingConfig) -> String {
    format!("devchain={},tower_http=debug", config.level)
}

/// Install the global subscriber: pretty or JSON, to stdout or a file
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(config))?,
    };

    let json = config.format.eq_ignore_ascii_case("json");

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let writer = Mutex::new(file);
            if json {
                fmt::layer().json().with_writer(writer).boxed()
            } else {
                fmt::layer().with_ansi(false).with_writer(writer).boxed()
            }
        }
        None if json => fmt::layer().json().boxed(),
        None => fmt::layer().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}
