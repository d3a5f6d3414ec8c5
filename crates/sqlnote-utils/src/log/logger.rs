use env_logger::{Builder, Env, Logger};
use log::{Level, LevelFilter};
use log_reload::{ReloadHandle, ReloadLog};
use std::sync::OnceLock;

static LOG_HANDLE: OnceLock<ReloadHandle<log_reload::LevelFilter<Logger>>> = OnceLock::new();

/// Module prefixes that follow the requested level; everything else stays at `warn`.
const WORKSPACE_CRATES: &[&str] = &[
    "sqlnote",
    "sqlnote_core",
    "sqlnote_db",
    "sqlnote_host_traits",
    "sqlnote_utils",
];

/// Parse a level name, falling back to `info` for anything unrecognised.
pub fn parse_level(log_level: &str) -> Level {
    match log_level.trim().to_lowercase().as_str() {
        "error" => Level::Error,
        "warn" | "warning" => Level::Warn,
        "info" => Level::Info,
        "debug" => Level::Debug,
        "trace" => Level::Trace,
        _ => Level::Info,
    }
}

fn build_logger(level: Level) -> log_reload::LevelFilter<Logger> {
    let mut builder = Builder::from_env(Env::default());

    // Dependencies stay quiet unless RUST_LOG says otherwise
    builder.filter_level(LevelFilter::Warn);
    for crate_name in WORKSPACE_CRATES {
        builder.filter_module(crate_name, level.to_level_filter());
    }

    log_reload::LevelFilter::new(level, builder.build())
}

/// Installs the logger on first call; later calls only swap the level.
pub fn init_logger(log_level: &str) -> anyhow::Result<()> {
    let level = parse_level(log_level);
    log::set_max_level(level.to_level_filter());

    if let Some(handle) = LOG_HANDLE.get() {
        return handle
            .replace(build_logger(level))
            .map_err(|e| anyhow::anyhow!(e));
    }

    let reload_log = ReloadLog::new(build_logger(level));
    let handle = reload_log.handle();
    log::set_boxed_logger(Box::new(reload_log))
        .map_err(|e| anyhow::anyhow!("Failed to set the logger: {}", e))?;

    if LOG_HANDLE.set(handle).is_err() {
        log::warn!("Logger handle was already registered");
    }
    Ok(())
}
