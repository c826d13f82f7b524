//! Logging setup and operation timing
//!
//! Applications embedding snowkit usually install their own subscriber and
//! only need [`timed`]. Scripts and the CLI can call [`init`] to get stderr
//! output and, optionally, a rolling JSON file for bug reports. `RUST_LOG`
//! always wins over the configured filter.

use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;

use snowkit_core::{Result, SnowkitError};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// How log lines are rendered on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormat {
    /// One short line per event
    #[default]
    Compact,
    /// Target, file and line for every event
    Verbose,
    /// No console output
    Off,
}

/// How often the JSON log file rolls over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl LogRotation {
    fn to_rotation(self) -> Rotation {
        match self {
            Self::Daily => Rotation::DAILY,
            Self::Hourly => Rotation::HOURLY,
            Self::Never => Rotation::NEVER,
        }
    }
}

/// Rolling JSON file sink
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    pub dir: PathBuf,
    /// File name prefix; the rotation suffix is appended
    pub prefix: String,
    pub rotation: LogRotation,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "snowkit.log".to_string(),
            rotation: LogRotation::Daily,
        }
    }

    pub fn rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// What [`init`] installs
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directive used when `RUST_LOG` is unset
    pub filter: String,
    pub console: ConsoleFormat,
    pub json_file: Option<JsonFileSink>,
    /// Emit an event when each span closes, with its busy/idle time
    pub span_timings: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::verbosity(0)
    }
}

impl LoggingConfig {
    /// Preset for command-line use, where each `-v` raises the level
    pub fn verbosity(level: u8) -> Self {
        let filter = match level {
            0 => "warn,snowkit=info",
            1 => "info,snowkit=debug,snowkit_connection=debug,snowkit_query=debug",
            _ => "debug,snowkit=trace,snowkit_connection=trace,snowkit_query=trace",
        };
        Self {
            filter: filter.to_string(),
            console: if level == 0 {
                ConsoleFormat::Compact
            } else {
                ConsoleFormat::Verbose
            },
            json_file: None,
            span_timings: level >= 2,
        }
    }

    /// Also write JSON lines under `dir`
    pub fn with_json_file(mut self, sink: JsonFileSink) -> Self {
        self.json_file = Some(sink);
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }
}

/// Default directory for JSON log files
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("snowkit")
        .join("logs")
}

fn console_layer(format: ConsoleFormat, span_events: FmtSpan, filter: EnvFilter) -> Option<BoxedLayer> {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(span_events);
    match format {
        ConsoleFormat::Off => None,
        ConsoleFormat::Compact => Some(
            layer
                .compact()
                .with_target(false)
                .with_filter(filter)
                .boxed(),
        ),
        ConsoleFormat::Verbose => Some(
            layer
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter)
                .boxed(),
        ),
    }
}

fn json_layer(sink: &JsonFileSink, span_events: FmtSpan, filter: EnvFilter) -> Result<(BoxedLayer, WorkerGuard)> {
    std::fs::create_dir_all(&sink.dir)?;
    let appender = RollingFileAppender::new(sink.rotation.to_rotation(), &sink.dir, &sink.prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_thread_names(true)
        .with_span_events(span_events)
        .with_writer(writer)
        .with_filter(filter)
        .boxed();
    Ok((layer, guard))
}

/// Install the global subscriber.
///
/// Hold the returned guard until exit: dropping it flushes the file writer.
/// Fails if a global subscriber is already installed.
pub fn init(config: LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    // CLOSE only: async spans are entered on every poll
    let span_events = if config.span_timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.extend(console_layer(config.console, span_events.clone(), filter()));

    let mut guard = None;
    if let Some(sink) = &config.json_file {
        let (layer, worker_guard) = json_layer(sink, span_events, filter())?;
        layers.push(layer);
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| SnowkitError::Other(format!("logging already initialized: {}", e)))?;

    tracing::debug!(
        console = ?config.console,
        json_dir = ?config.json_file.as_ref().map(|sink| sink.dir.display().to_string()),
        "logging initialized"
    );

    Ok(guard)
}

/// Await `fut`, logging when it starts and how long it took.
///
/// The duration is logged whether the operation succeeds or fails.
pub async fn timed<F, T>(operation: impl AsRef<str>, fut: F) -> T
where
    F: Future<Output = T>,
{
    let operation = operation.as_ref();
    tracing::debug!("Starting {}...", operation);
    let start = Instant::now();
    let output = fut.await;
    let elapsed = start.elapsed();
    tracing::info!(
        elapsed_ms = elapsed.as_millis() as u64,
        "{} completed in {:.3}s",
        operation,
        elapsed.as_secs_f64()
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timed_passes_output_through() {
        let value = timed("answer", async { 42 }).await;
        assert_eq!(value, 42);

        let err: Result<()> = timed("failing", async { Err(SnowkitError::Query("boom".into())) }).await;
        assert!(err.is_err());
    }

    #[test]
    fn test_verbosity_presets() {
        let quiet = LoggingConfig::default();
        assert_eq!(quiet.console, ConsoleFormat::Compact);
        assert!(quiet.json_file.is_none());
        assert!(!quiet.span_timings);

        let loud = LoggingConfig::verbosity(3);
        assert_eq!(loud.console, ConsoleFormat::Verbose);
        assert!(loud.span_timings);
        assert!(loud.filter.starts_with("debug"));
    }

    #[test]
    fn test_json_sink_builder() {
        let config = LoggingConfig::verbosity(1)
            .with_filter("trace")
            .with_json_file(JsonFileSink::new("/tmp/snowkit-logs").rotation(LogRotation::Never));

        assert_eq!(config.filter, "trace");
        let sink = config.json_file.unwrap();
        assert_eq!(sink.rotation, LogRotation::Never);
        assert_eq!(sink.prefix, "snowkit.log");
        assert!(log_directory().ends_with("snowkit/logs"));
    }

    #[test]
    fn test_json_layer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("nested"));

        let (_layer, _guard) = json_layer(&sink, FmtSpan::NONE, EnvFilter::new("info")).unwrap();

        assert!(dir.path().join("nested").is_dir());
    }
}
