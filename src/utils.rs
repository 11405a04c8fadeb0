use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// Colored stdout logger. Dependencies stay at `Warn`, this crate logs at `level`.
pub fn setup_logger(level: LevelFilter) -> Result<(), fern::InitError> {
    let colors = ColoredLevelConfig::new()
        .trace(Color::BrightBlack)
        .debug(Color::Blue)
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%H:%M:%S]"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Warn)
        .level_for("kpi_settlement", level)
        .chain(std::io::stdout())
        .apply()?;

    Ok(())
}
