use std::{
    env,
    io::{stderr, IsTerminal, Write},
    str::FromStr,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};
use log::{LevelFilter, Metadata, Record};
use termcolor::{BufferedStandardStream, Color, ColorChoice, ColorSpec, WriteColor};
use time::{macros::format_description, OffsetDateTime};

/// Environment variable used to select the log level.
pub(crate) const LOG_LEVEL_ENV: &str = "CMDTRAIL_LOG";

/// Our own logger implementation, to handle log:: messages.
pub(crate) struct Logger {
    /// Max level the logger will output.
    max_level: LevelFilter,
    /// Inner writer, alongside its configuration.
    inner: Mutex<LoggerWriter>,
}

struct LoggerWriter {
    /// Everything goes to stderr, stdout is never used.
    stderr: BufferedStandardStream,
    /// Should colors be used in the output?
    use_colors: bool,
}

impl Logger {
    pub(crate) fn init(max_level: LevelFilter) -> Result<Arc<Self>> {
        let logger = Arc::new(Logger {
            max_level,
            inner: Mutex::new(LoggerWriter {
                stderr: BufferedStandardStream::stderr(ColorChoice::Auto),
                use_colors: Self::check_color_use(),
            }),
        });

        log::set_max_level(max_level);
        log::set_boxed_logger(Box::new(Arc::clone(&logger)))?;

        Ok(logger)
    }

    /// Reads the log level from the environment. By default only warnings and
    /// errors are shown.
    pub(crate) fn level_from_env() -> Result<LevelFilter> {
        level_or_default(env::var(LOG_LEVEL_ENV).ok().as_deref())
    }

    pub(crate) fn try_log(&self, record: &Record) -> Result<()> {
        static LEVEL_COLORS: &[Option<Color>] = &[
            None,                // Default.
            Some(Color::Red),    // Error.
            Some(Color::Yellow), // Warn.
            Some(Color::Blue),   // Info.
            Some(Color::Cyan),   // Debug.
            Some(Color::White),  // Trace.
        ];
        let inner: &mut LoggerWriter = &mut self.inner.lock().unwrap();

        // If the log level allows debug! and/or trace!, show the time.
        if self.max_level >= LevelFilter::Debug {
            OffsetDateTime::now_utc().format_into(
                &mut inner.stderr,
                format_description!("[hour]:[minute]:[second].[subsecond digits:6] "),
            )?;
        }

        // Show the level for error! and warn!, or if the max level includes
        // debug!.
        if record.level() <= LevelFilter::Warn || self.max_level >= LevelFilter::Debug {
            if inner.use_colors {
                inner
                    .stderr
                    .set_color(ColorSpec::new().set_fg(LEVEL_COLORS[record.level() as usize]))?;
            }
            write!(inner.stderr, "{:5} ", record.level(),)?;
            if inner.use_colors {
                inner.stderr.reset()?;
            }
        }

        writeln!(inner.stderr, "{}", record.args())?;

        inner.stderr.flush()?;
        Ok(())
    }

    /// Check if colors can be used in the output.
    fn check_color_use() -> bool {
        if !stderr().is_terminal() {
            return false;
        }
        matches!(env::var("TERM"), Ok(x) if x != "dumb")
    }
}

fn level_or_default(level: Option<&str>) -> Result<LevelFilter> {
    match level {
        Some(level) => parse_level(level),
        None => Ok(LevelFilter::Warn),
    }
}

fn parse_level(level: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(level.trim())
        .map_err(|_| anyhow!("Invalid log level in {LOG_LEVEL_ENV}: '{level}'"))
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Not much we can do to report the error...
        let _ = self.try_log(record);
    }

    fn flush(&self) {
        // Not much we can do to report the error...
        let _ = self.inner.lock().unwrap().stderr.flush();
    }
}

/// Forwards libbpf's own messages to our logger.
pub(crate) fn forward_libbpf_logs() {
    use libbpf_rs::PrintLevel;

    fn print(level: PrintLevel, msg: String) {
        let msg = msg.trim_end();
        match level {
            PrintLevel::Warn => log::warn!("libbpf: {msg}"),
            PrintLevel::Info => log::debug!("libbpf: {msg}"),
            PrintLevel::Debug => log::trace!("libbpf: {msg}"),
        }
    }

    let _ = libbpf_rs::set_print(Some((PrintLevel::Debug, print)));
}
