mod anim;
mod config;
mod core;
mod glyph;
mod input;
mod render;
mod types;
mod ui;

use std::{env, fs::OpenOptions, io, sync::Mutex};

use tracing::info;
use tracing_subscriber::EnvFilter;

use config::SimConfig;
use ui::AppError;

fn main() -> Result<(), AppError> {
    init_tracing();
    info!("=== glyphfall startup ===");

    let config = SimConfig::load()?;
    ui::run(config)
}

/// The terminal belongs to the UI, so logs go to a file instead of stderr.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let path = env::var(config::LOG_ENV_VAR).unwrap_or_else(|_| config::DEFAULT_LOG_FILE.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_ansi(false)
        .compact();

    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => builder.with_writer(Mutex::new(file)).init(),
        Err(_) => builder.with_writer(io::sink).init(),
    }
}
