//! Tracing subscriber setup.
//!
//! - `LOG_LEVEL` holds an `EnvFilter` directive, e.g. "debug" or
//!   "info,game_maker_backend=debug,tower_http=info".
//! - `LOG_FORMAT=json` switches to structured JSON lines; anything else is the
//!   human-readable formatter.

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
        EnvFilter::new("info,game_maker_backend=debug,tower_http=info,axum=info")
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
