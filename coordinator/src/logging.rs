//! Structured stdout logging, colored and timestamped. Mirrors the
//! `fern`-based setup the rest of the pack's daemons use rather than
//! reaching for `env_logger`.

use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

use crate::config::Config;

pub fn init(config: &Config) -> anyhow::Result<()> {
    let level = config.log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {message}",
                chrono::Utc::now().to_rfc3339(),
                colors.color(record.level()),
                record.target(),
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}
