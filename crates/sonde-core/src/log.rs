//! Leveled event log with an explicit start/finish lifecycle.
//!
//! An [`EventLog`] is a handle, not global state: open one per process (or
//! per test) and pass it, usually as `Arc<EventLog>`, to the stages that
//! report. Every record is also forwarded to `tracing`.
//!
//! Output format:
//!
//! ```text
//! monitor started at 1760745600
//! MESSAGE: onset in band 24
//! WARNING: pulse truncated
//! monitor finished at 1760745660
//! ```

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Fatal,
    Error,
    Warning,
    Message,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Fatal => "FATAL",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Message => "MESSAGE",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Sink {
    writer: Box<dyn Write + Send>,
    finished: bool,
}

pub struct EventLog {
    app_name: String,
    sink: Mutex<Sink>,
}

impl EventLog {
    /// Append to the file at `path`, creating it if needed.
    pub fn open(path: impl AsRef<Path>, app_name: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Self::with_writer(Box::new(io::LineWriter::new(file)), app_name)
    }

    pub fn stderr(app_name: &str) -> Result<Self> {
        Self::with_writer(Box::new(io::stderr()), app_name)
    }

    /// Log to an arbitrary sink. Writes the "started" record immediately.
    pub fn with_writer(mut writer: Box<dyn Write + Send>, app_name: &str) -> Result<Self> {
        writeln!(writer, "{app_name} started at {}", unix_seconds())?;
        tracing::info!(app = app_name, "log started");
        Ok(Self {
            app_name: app_name.to_string(),
            sink: Mutex::new(Sink {
                writer,
                finished: false,
            }),
        })
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Write one record. A [`LogLevel::Fatal`] record terminates the process;
    /// see [`fatal`](Self::fatal).
    pub fn log(&self, level: LogLevel, message: &str) -> Result<()> {
        if level == LogLevel::Fatal {
            self.fatal(message);
        }
        match level {
            LogLevel::Error => tracing::error!(app = %self.app_name, "{message}"),
            LogLevel::Warning => tracing::warn!(app = %self.app_name, "{message}"),
            _ => tracing::info!(app = %self.app_name, "{message}"),
        }
        let mut sink = self.sink.lock();
        writeln!(sink.writer, "{level}: {message}")?;
        Ok(())
    }

    pub fn message(&self, message: &str) -> Result<()> {
        self.log(LogLevel::Message, message)
    }

    pub fn warning(&self, message: &str) -> Result<()> {
        self.log(LogLevel::Warning, message)
    }

    pub fn error(&self, message: &str) -> Result<()> {
        self.log(LogLevel::Error, message)
    }

    /// Write a FATAL record and the "finished" record, flush, and exit the
    /// process with status 1.
    pub fn fatal(&self, message: &str) -> ! {
        tracing::error!(app = %self.app_name, fatal = true, "{message}");
        {
            let mut sink = self.sink.lock();
            // Exiting regardless; a failing sink has nowhere left to report.
            let _ = writeln!(sink.writer, "{}: {message}", LogLevel::Fatal);
            let _ = Self::write_finished(&self.app_name, &mut sink);
        }
        std::process::exit(1);
    }

    /// Flush buffered records to the sink.
    pub fn sync(&self) -> Result<()> {
        self.sink.lock().writer.flush()?;
        Ok(())
    }

    /// Write the "finished" record and flush.
    pub fn finish(self) -> Result<()> {
        let mut sink = self.sink.lock();
        Self::write_finished(&self.app_name, &mut sink)
    }

    fn write_finished(app_name: &str, sink: &mut Sink) -> Result<()> {
        if sink.finished {
            return Ok(());
        }
        sink.finished = true;
        writeln!(sink.writer, "{app_name} finished at {}", unix_seconds())?;
        sink.writer.flush()?;
        tracing::info!(app = app_name, "log finished");
        Ok(())
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        let sink = self.sink.get_mut();
        if let Err(err) = Self::write_finished(&self.app_name, sink) {
            tracing::warn!(app = %self.app_name, "failed to finish log: {err}");
        }
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("app_name", &self.app_name)
            .finish_non_exhaustive()
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
