//! Structured logger construction.
//!
//! `build_logger` turns a [`LoggerConfig`] into a [`Logger`] handle wrapping a
//! `tracing` dispatcher. Nothing is installed globally until the caller asks
//! for it, so tests and embedders can build as many loggers as they like.
//!
//! Every event goes to `output_paths`; error-level events are also copied to
//! `error_output_paths`. Each entry is `stdout`, `stderr` or a file path
//! opened in append mode.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::hash::Hash;
use std::io;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::callsite::Identifier;
use tracing::dispatcher::SetGlobalDefaultError;
use tracing::subscriber::Interest;
use tracing::{Dispatch, Level, Metadata};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::layer::{Context, Filter, SubscriberExt};
use tracing_subscriber::{fmt, Layer, Registry};

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log level {0:?}")]
    Level(String),
    #[error("unknown log encoding {0:?}")]
    Encoding(String),
    #[error("no {0} configured")]
    NoSinks(&'static str),
    #[error("sampling initial and thereafter must be non-zero")]
    Sampling,
    #[error("cannot open log sink {path}: {source}")]
    Sink {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("a global logger is already installed")]
    AlreadyInstalled(#[source] SetGlobalDefaultError),
}

/// Per-callsite sampling: within each tick the first `initial` events are
/// kept, then every `thereafter`-th one. Events are counted by the callsite
/// that emitted them, not by level and message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub initial: u64,
    pub thereafter: u64,
    pub tick_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            initial: 100,
            thereafter: 100,
            tick_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error`.
    pub level: String,
    /// `None` disables sampling.
    pub sampling: Option<SamplingConfig>,
    /// `json` or `console`.
    pub encoding: String,
    pub output_paths: Vec<String>,
    pub error_output_paths: Vec<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            sampling: Some(SamplingConfig::default()),
            encoding: "json".to_string(),
            output_paths: vec!["stdout".to_string()],
            error_output_paths: vec!["stderr".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Json,
    Console,
}

fn parse_level(level: &str) -> Result<LevelFilter, LoggerError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        _ => Err(LoggerError::Level(level.to_string())),
    }
}

fn parse_encoding(encoding: &str) -> Result<Encoding, LoggerError> {
    match encoding.trim().to_ascii_lowercase().as_str() {
        "json" => Ok(Encoding::Json),
        "console" => Ok(Encoding::Console),
        _ => Err(LoggerError::Encoding(encoding.to_string())),
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    seen: u64,
}

#[derive(Debug)]
struct Sampler<K> {
    initial: u64,
    thereafter: u64,
    tick: Duration,
    windows: Mutex<HashMap<K, Window>>,
}

impl<K: Hash + Eq> Sampler<K> {
    fn new(config: &SamplingConfig) -> Result<Self, LoggerError> {
        if config.initial == 0 || config.thereafter == 0 {
            return Err(LoggerError::Sampling);
        }
        Ok(Self {
            initial: config.initial,
            thereafter: config.thereafter,
            tick: Duration::from_millis(config.tick_ms),
            windows: Mutex::new(HashMap::new()),
        })
    }

    fn admit(&self, key: K, now: Instant) -> bool {
        let mut windows = self.windows.lock();
        let window = windows.entry(key).or_insert(Window {
            started: now,
            seen: 0,
        });
        if now.saturating_duration_since(window.started) >= self.tick {
            window.started = now;
            window.seen = 0;
        }
        window.seen += 1;
        window.seen <= self.initial || (window.seen - self.initial) % self.thereafter == 0
    }
}

/// Level check first, so events below the level never consume sampling budget.
struct EventFilter {
    level: LevelFilter,
    sampler: Option<Sampler<Identifier>>,
}

impl<S> Filter<S> for EventFilter {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        if *meta.level() > self.level {
            return false;
        }
        match &self.sampler {
            Some(sampler) if meta.is_event() => sampler.admit(meta.callsite(), Instant::now()),
            _ => true,
        }
    }

    fn callsite_enabled(&self, meta: &'static Metadata<'static>) -> Interest {
        if *meta.level() > self.level {
            Interest::never()
        } else if self.sampler.is_some() && meta.is_event() {
            // Sampling is decided per event, so the answer must not be cached.
            Interest::sometimes()
        } else {
            Interest::always()
        }
    }

    fn max_level_hint(&self) -> Option<LevelFilter> {
        Some(self.level)
    }
}

fn open_sink(path: &str) -> Result<BoxMakeWriter, LoggerError> {
    match path {
        "stdout" => Ok(BoxMakeWriter::new(io::stdout)),
        "stderr" => Ok(BoxMakeWriter::new(io::stderr)),
        file => {
            let handle = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .map_err(|source| LoggerError::Sink {
                    path: file.to_string(),
                    source,
                })?;
            Ok(BoxMakeWriter::new(std::sync::Mutex::new(handle)))
        }
    }
}

fn open_sinks(paths: &[String], label: &'static str) -> Result<BoxMakeWriter, LoggerError> {
    let mut sinks = paths.iter().map(|path| open_sink(path));
    let mut writer = match sinks.next() {
        Some(first) => first?,
        None => return Err(LoggerError::NoSinks(label)),
    };
    for sink in sinks {
        writer = BoxMakeWriter::new(writer.and(sink?));
    }
    Ok(writer)
}

/// Handle to a fully configured logger.
#[derive(Clone, Debug)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Makes this logger the process-wide default. Fails if one is already set.
    pub fn install_global(self) -> Result<(), LoggerError> {
        tracing::dispatcher::set_global_default(self.dispatch).map_err(LoggerError::AlreadyInstalled)
    }

    /// Runs `f` with this logger as the current thread's default.
    pub fn with_default<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

/// Builds a logger from `config`. Every invalid setting is reported as an
/// error; nothing is installed globally.
pub fn build_logger(config: &LoggerConfig) -> Result<Logger, LoggerError> {
    let level = parse_level(&config.level)?;
    let encoding = parse_encoding(&config.encoding)?;
    let sampler = config.sampling.as_ref().map(Sampler::new).transpose()?;

    let outputs = open_sinks(&config.output_paths, "output paths")?;
    let errors = open_sinks(&config.error_output_paths, "error output paths")?;
    let writer = BoxMakeWriter::new(outputs.and(errors.with_max_level(Level::ERROR)));

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match encoding {
        Encoding::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
        Encoding::Console => fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(writer)
            .boxed(),
    };

    let subscriber = Registry::default().with(layer.with_filter(EventFilter { level, sampler }));
    Ok(Logger {
        dispatch: Dispatch::new(subscriber),
    })
}
