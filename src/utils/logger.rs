use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Base directory for log files; the current directory when `None`.
    pub dir: Option<PathBuf>,
    pub level: String,
    pub retention: u32,
    /// Persist `dev6!` lines to `dev6.log`.
    pub dev6: bool,
    /// Mirror warnings and errors to stderr.
    pub stderr: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self { dir: None, level: "info".into(), retention: 7, dev6: false, stderr: false }
    }
}

#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Builds the log4rs configuration without installing it.
///
/// # Errors
/// Returns an error if the log directory cannot be created or an appender fails to open.
pub fn build_config(opts: &LogOptions) -> Result<Config, Box<dyn std::error::Error>> {
    let base = match &opts.dir {
        Some(d) => d.clone(),
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&base)?;
    let lvl = parse_level(&opts.level);
    let keep = opts.retention.max(1);

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "plp-bookstore", keep)?)));
    let mut root = Root::builder().appender("app");

    if opts.stderr {
        let console = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new("[{l}] {m}{n}")))
            .build();
        builder = builder.appender(
            Appender::builder()
                .filter(Box::new(log4rs::filter::threshold::ThresholdFilter::new(LevelFilter::Warn)))
                .build("stderr", Box::new(console)),
        );
        root = root.appender("stderr");
    }

    builder = if opts.dev6 {
        builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(&base, "dev6", keep)?)))
            .logger(
                Logger::builder()
                    .appender("dev6")
                    .additive(false)
                    .build(crate::utils::devlog::DEV_TARGET, LevelFilter::Trace),
            )
    } else {
        builder.logger(Logger::builder().additive(false).build(crate::utils::devlog::DEV_TARGET, LevelFilter::Off))
    };

    // the driver is chatty at debug and below
    builder = builder.logger(Logger::builder().build("mongodb", lvl.min(LevelFilter::Info)));

    Ok(builder.build(root.build(lvl))?)
}

/// Configures logging globally for the process.
///
/// # Errors
/// Returns an error if the configuration cannot be built or a logger is already installed.
pub fn configure_logging(opts: &LogOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(opts)?;
    log4rs::init_config(config)?;
    log::debug!("logging configured: level={} dir={:?} dev6={}", opts.level, opts.dir, opts.dev6);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_are_case_insensitive() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("warn"), LevelFilter::Warn);
        assert_eq!(parse_level("nonsense"), LevelFilter::Info);
    }

    #[test]
    fn config_builds_into_a_fresh_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs");
        let opts = LogOptions { dir: Some(dir.clone()), dev6: true, stderr: true, ..LogOptions::default() };
        let cfg = build_config(&opts).unwrap();
        assert!(dir.is_dir());
        assert_eq!(cfg.appenders().len(), 3);
    }
}
