//! The log sink every pitr program writes to.
//!
//! The `--log` value is a strftime template for the log file name, written with
//! `^` instead of `%` so it survives shells and cron lines untouched
//! (`/var/log/pitr/status-^Y-^m-^d.log`). The value `-` logs to stdout.
//!
//! The file name is rendered again for every event, so a long-running program
//! moves on to a new file when the date in the name changes.

use crate::error::{Error, Result};
use chrono::Local;
use std::collections::HashMap;
use std::fmt::{Display, Write as _};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{Dispatch, Level};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// `--log` value selecting stdout.
pub const STDOUT_MARKER: &str = "-";

/// Rewrites the caret syntax of `--log` into a strftime template.
pub fn caret_to_percent(value: &str) -> String {
    value.replace('^', "%")
}

/// Renders a strftime template against the local time.
///
/// # Errors
/// [`Error::LogTemplate`] if the template contains an invalid specifier.
pub fn render_path(template: &str) -> Result<PathBuf> {
    let mut rendered = String::new();
    write!(rendered, "{}", Local::now().format(template)).map_err(|_| Error::LogTemplate {
        template: template.to_string(),
    })?;
    Ok(PathBuf::from(rendered))
}

/// Where a [`Logger`] writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    Stdout,
    /// The file opened at start-up. Later events may go to a file with a newer
    /// rendering of the template.
    File(PathBuf),
}

fn open_log_file(path: &Path) -> Result<File> {
    let open_error = |source| Error::LogOpen {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(open_error)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(open_error)
}

struct OpenLog {
    path: PathBuf,
    file: File,
}

/// Log file named by a strftime template, reopened whenever the rendered name
/// changes.
struct DatedLogFile {
    template: String,
    current: Mutex<OpenLog>,
}

impl DatedLogFile {
    fn open(template: &str, path: PathBuf) -> Result<Self> {
        let file = open_log_file(&path)?;
        Ok(Self {
            template: template.to_string(),
            current: Mutex::new(OpenLog { path, file }),
        })
    }
}

impl<'a> MakeWriter<'a> for DatedLogFile {
    type Writer = DatedLogWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        // Stay on the current file if the new one cannot be opened.
        if let Ok(path) = render_path(&self.template) {
            if path != current.path {
                if let Ok(file) = open_log_file(&path) {
                    *current = OpenLog { path, file };
                }
            }
        }
        DatedLogWriter(current)
    }
}

struct DatedLogWriter<'a>(MutexGuard<'a, OpenLog>);

impl io::Write for DatedLogWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.file.flush()
    }
}

/// Leveled logger with named timers, backed by a `tracing` fmt subscriber.
pub struct Logger {
    dispatch: Dispatch,
    destination: LogDestination,
    timers: HashMap<String, Instant>,
}

impl Logger {
    /// Opens the sink described by a strftime `template` (already in `%`
    /// form). Events below `level` are discarded.
    ///
    /// # Errors
    /// [`Error::LogTemplate`] for a bad template, [`Error::LogOpen`] if the log
    /// file or its directory cannot be created.
    pub fn open(template: &str, level: Level) -> Result<Self> {
        let (destination, writer) = if template == STDOUT_MARKER {
            (LogDestination::Stdout, BoxMakeWriter::new(std::io::stdout))
        } else {
            let path = render_path(template)?;
            let file = DatedLogFile::open(template, path.clone())?;
            (LogDestination::File(path), BoxMakeWriter::new(file))
        };

        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .with_max_level(level)
            .finish();

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            destination,
            timers: HashMap::new(),
        })
    }

    pub fn destination(&self) -> &LogDestination {
        &self.destination
    }

    /// Makes this logger the process-wide default for plain `tracing` macros.
    /// Returns false if another default was installed first.
    pub fn install(&self) -> bool {
        tracing::dispatcher::set_global_default(self.dispatch.clone()).is_ok()
    }

    fn emit(&self, event: impl FnOnce()) {
        tracing::dispatcher::with_default(&self.dispatch, event);
    }

    pub fn debug(&self, message: impl Display) {
        self.emit(|| tracing::debug!("{message}"));
    }

    pub fn info(&self, message: impl Display) {
        self.emit(|| tracing::info!("{message}"));
    }

    pub fn warn(&self, message: impl Display) {
        self.emit(|| tracing::warn!("{message}"));
    }

    pub fn error(&self, message: impl Display) {
        self.emit(|| tracing::error!("{message}"));
    }

    /// Logs an error the program will not survive. Terminating is up to the
    /// caller.
    pub fn fatal(&self, message: impl Display) {
        self.emit(|| tracing::error!(fatal = true, "{message}"));
    }

    /// Starts (or restarts) the timer `name`.
    pub fn time_start(&mut self, name: &str) {
        self.timers.insert(name.to_string(), Instant::now());
        self.debug(format_args!("Timer [{name}] started"));
    }

    /// Stops the timer `name` and logs how long it ran.
    pub fn time_finish(&mut self, name: &str) -> Option<Duration> {
        let Some(started) = self.timers.remove(name) else {
            self.warn(format_args!("Timer [{name}] finished without being started"));
            return None;
        };
        let elapsed = started.elapsed();
        self.info(format_args!(
            "Timer [{name}] took: {:.3}s",
            elapsed.as_secs_f64()
        ));
        Some(elapsed)
    }
}
