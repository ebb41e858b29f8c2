//! Tracing setup.
//!
//! - LOG_LEVEL holds filter directives; unset falls back to [`DEFAULT_DIRECTIVES`].
//! - LOG_FORMAT=json switches to one JSON object per line, anything else is pretty text.
//!
//! Domain targets used across the crate: `exam`, `tutor`, `portfolio`, `store`,
//! `moet_study` (startup, transport). TraceLayer adds per-request spans on top.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_DIRECTIVES: &str =
    "info,exam=debug,tutor=debug,portfolio=debug,store=info,moet_study=debug,tower_http=info,axum=info";

fn filter_from_env() -> EnvFilter {
    EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

pub fn init_tracing() {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter_from_env())
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}
