//! Tracing initialisation for the `seodeploy` binary.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored
//! because the global subscriber can only be set once per process.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialise the global tracing subscriber.
///
/// * `json`: emit newline-delimited JSON log lines.
/// * `level`: default verbosity when `RUST_LOG` is not set.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::registry()
        .with(output_layer(json))
        .with(env_filter)
        .try_init()
        .is_ok()
}

fn output_layer(json: bool) -> OutputLayer {
    let format = fmt::layer().with_target(false);
    if json {
        format.json().boxed()
    } else {
        format.compact().boxed()
    }
}

/// Map the CLI `--verbose` count to a default level.
pub fn level_for_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}
