//! Prints what the logger bootstrap produces, one record per level.

use dapr_sdk::prelude::*;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

fn main() {
    setup_logger(std::io::stdout);

    let started = Instant::now();
    trace!(target: LOGGER_NAME, "trace is below the development level");
    debug!(target: LOGGER_NAME, "debug record");
    info!(target: LOGGER_NAME, store = "statestore", key = "key1", "info record with fields");
    info!(target: LOGGER_NAME, timeout = duration(Duration::from_millis(1500)), "durations are encoded as seconds");
    warn!(target: LOGGER_NAME, "warn record carries a stacktrace");
    error!(target: LOGGER_NAME, elapsed = duration(started.elapsed()), "error record");
}
