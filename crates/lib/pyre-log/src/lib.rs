use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// Logging configuration a host binary passes to [`init_log`] once at
/// startup. The render graph core itself never calls this — library crates
/// don't own global logging init.
pub struct LogConfig {
    pub level: LevelFilter,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: LevelFilter::Info }
    }
}

pub fn init_log(config: LogConfig) -> anyhow::Result<()> {
    setup_logger(&config)?;
    log::info!("log initialized!");
    Ok(())
}

fn setup_logger(config: &LogConfig) -> anyhow::Result<()> {
    let colors = ColoredLevelConfig::new()
        .trace(Color::White)
        .debug(Color::Magenta)
        .info(Color::Cyan)
        .warn(Color::Yellow)
        .error(Color::Red);

    let stdout = fern::Dispatch::new()
        .filter(|metadata| metadata.level() >= LevelFilter::Info)
        .chain(std::io::stdout());

    let stderr = fern::Dispatch::new().level(LevelFilter::Warn).chain(std::io::stderr());

    let console_output = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(stdout)
        .chain(stderr);

    let file_output = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(fern::log_file("log.log")?);

    fern::Dispatch::new().level(config.level).chain(console_output).chain(file_output).apply()?;

    Ok(())
}
