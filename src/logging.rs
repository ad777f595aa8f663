//! Log output setup.

use log::LevelFilter;

pub const LOG_ENV: &str = "MESHVIEW_LOG";

/// Parses a level name, falling back to `Info` for anything unknown.
pub fn level_from_str(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::Info)
}

/// Sends log records to stderr, with the level taken from `$MESHVIEW_LOG`.
pub fn init() -> Result<(), log::SetLoggerError> {
    let level = std::env::var(LOG_ENV)
        .map(|level| level_from_str(&level))
        .unwrap_or(LevelFilter::Info);

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
}
