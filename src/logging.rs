//! Logging setup
//!
//! Lines look like `2024-01-15 10:15:05: [hall] heating on`. The bracketed tag is
//! taken from a `thermostat` field on the event; lines without one are untagged.

use crate::config::Settings;
use crate::error::{Result, ThermologError};
use chrono::Local;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Debug level instead of info; overrides RUST_LOG
    pub verbose: bool,

    /// Log file, stderr when unset
    pub destination: Option<PathBuf>,
}

impl LogConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            verbose: settings.verbose,
            destination: settings.log_destination.clone(),
        }
    }

    fn filter(&self) -> EnvFilter {
        if self.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    thermostat: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "thermostat" => self.thermostat = Some(value.to_string()),
            name => self.fields.push((name, value.to_string())),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "thermostat" => self.thermostat = Some(format!("{value:?}")),
            name => self.fields.push((name, format!("{value:?}"))),
        }
    }
}

/// `<timestamp>: [<thermostat>] <message> key=value...`
#[derive(Debug, Clone, Copy, Default)]
pub struct DaemonFormat;

impl<S, N> FormatEvent<S, N> for DaemonFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut line = LineVisitor::default();
        event.record(&mut line);

        write!(writer, "{}: ", Local::now().format(TIMESTAMP_FORMAT))?;
        if let Some(tag) = &line.thermostat {
            write!(writer, "[{tag}] ")?;
        }
        writer.write_str(&line.message)?;
        for (name, value) in &line.fields {
            write!(writer, " {name}={value}")?;
        }
        writeln!(writer)
    }
}

fn split_destination(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let file_name = path.file_name().ok_or_else(|| {
        ThermologError::config(format!("Log destination {} is not a file", path.display()))
    })?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((directory, PathBuf::from(file_name)))
}

/// Install the global subscriber.
///
/// With a file destination the returned guard flushes the background writer on
/// drop and must be held until exit.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = config.filter();

    match &config.destination {
        Some(path) => {
            let (directory, file_name) = split_destination(path)?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .event_format(DaemonFormat)
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .try_init()
                .map_err(|e| ThermologError::config(format!("Failed to initialize logging: {e}")))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .event_format(DaemonFormat)
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .map_err(|e| ThermologError::config(format!("Failed to initialize logging: {e}")))?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(emit: impl FnOnce()) -> String {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(DaemonFormat)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, emit);

        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_thermostat_tag() {
        let output = capture(|| tracing::info!(thermostat = "hall", "heating on"));
        let (timestamp, rest) = output.split_once(": ").unwrap();

        assert_eq!(timestamp.len(), 19);
        assert_eq!(rest, "[hall] heating on\n");
    }

    #[test]
    fn test_untagged_warning_with_fields() {
        let output = capture(|| tracing::warn!(cycles = 3, "weather stale"));
        assert!(output.ends_with(": weather stale cycles=3\n"), "{output}");
        assert!(!output.contains('['));
    }

    #[test]
    fn test_split_destination() {
        let (dir, file) = split_destination(Path::new("/var/log/thermolog.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log"));
        assert_eq!(file, PathBuf::from("thermolog.log"));

        let (dir, _) = split_destination(Path::new("thermolog.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
    }
}
