//! Tracing setup for the `plan` binary.
//!
//! Logs go to stderr so command output on stdout stays clean. The filter
//! comes from `PLAN_LOG` (default `info`), e.g. `PLAN_LOG=plan_harness=debug`.

use std::env;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "PLAN_LOG";

pub fn init_logger() {
    let filter = env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));

    // A second init (e.g. from tests) is not an error.
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter_layer)
        .try_init();
}
