//! Tracing configuration for the pipeline binaries
//!
//! Binaries configure subscribers; the library only emits trace events. Both
//! stages log one event per line to the console and, when a log file is
//! configured, tee the same events to that file.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output destination for trace events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracingOutput {
    /// Console only
    Console,
    /// Console plus an append-only log file
    Both(std::path::PathBuf),
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    /// Output destination
    pub output: TracingOutput,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            output: TracingOutput::Console,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    /// Create a new tracing configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-2+)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set output destination
    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Set custom environment filter
    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Initialize the global subscriber
    ///
    /// Returns the file writer guard when a log file is configured; the
    /// caller must hold it for the lifetime of the process or buffered
    /// events are lost on exit.
    ///
    /// # Errors
    /// - Invalid environment filter string
    pub fn init(self) -> anyhow::Result<Option<WorkerGuard>> {
        use tracing_subscriber::fmt;

        let filter = if let Some(env_filter) = &self.env_filter {
            EnvFilter::try_new(env_filter)?
        } else {
            EnvFilter::try_new(self.verbosity_to_filter())?
        };

        let registry = Registry::default().with(filter);

        let console_layer = fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(false)
            .with_line_number(false)
            .with_level(true)
            .compact();

        match self.output {
            TracingOutput::Console => {
                registry.with(console_layer).init();
                Ok(None)
            },
            TracingOutput::Both(path) => {
                use tracing_appender::{non_blocking, rolling};

                let log_dir = match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent,
                    _ => std::path::Path::new("."),
                };
                let file_appender = rolling::never(
                    log_dir,
                    path.file_name()
                        .unwrap_or_else(|| std::ffi::OsStr::new("watchshot.log")),
                );
                let (file_writer, guard) = non_blocking(file_appender);

                let file_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(file_writer)
                    .compact();

                registry.with(console_layer).with(file_layer).init();
                Ok(Some(guard))
            },
        }
    }
}
