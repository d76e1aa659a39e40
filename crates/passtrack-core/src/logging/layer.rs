//! `tracing` layer that writes events to a session JSONL file

use std::fmt::Write as FmtWrite;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

use super::entry::JsonLogEntry;
use super::writer::SessionLogWriter;
use crate::error::{TrackerError, TrackerResult};

pub struct JsonlLayer {
    writer: Arc<SessionLogWriter>,
}

impl JsonlLayer {
    pub fn new(logs_dir: impl AsRef<Path>, session: impl Into<String>) -> std::io::Result<Self> {
        Ok(Self {
            writer: Arc::new(SessionLogWriter::new(logs_dir, session)?),
        })
    }

    pub fn log_path(&self) -> &Path {
        self.writer.path()
    }

    pub fn session(&self) -> &str {
        self.writer.session()
    }
}

impl<S> Layer<S> for JsonlLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let mut entry = JsonLogEntry::new(
            metadata.level().as_str().to_lowercase(),
            self.writer.session(),
            metadata.target(),
            visitor.message.unwrap_or_default(),
        );
        if !visitor.fields.is_empty() {
            entry = entry.with_fields(Value::Object(visitor.fields));
        }
        if let Some(scope) = ctx.event_scope(event) {
            let spans: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !spans.is_empty() {
                entry = entry.with_span(spans.join(" > "));
            }
        }

        // Write errors are dropped
        let _ = self.writer.write(&entry);
    }
}

#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl JsonVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(&mut buf, "{:?}", value);
        if field.name() == "message" {
            self.message = Some(buf);
        } else {
            self.insert(field, Value::String(buf));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::Number(value.into()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.insert(field, Value::Number(n));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }
}

/// Installs the global subscriber: env filter, JSONL file, optional console
pub struct LoggingBuilder {
    logs_dir: PathBuf,
    session: String,
    console_output: bool,
    env_filter: Option<String>,
}

impl LoggingBuilder {
    pub fn new(logs_dir: impl Into<PathBuf>, session: impl Into<String>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            session: session.into(),
            console_output: true,
            env_filter: None,
        }
    }

    /// Only write to the JSONL file
    pub fn no_console(mut self) -> Self {
        self.console_output = false;
        self
    }

    /// Filter directives, e.g. `passtrack_core=debug`. `RUST_LOG` wins when
    /// set.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    pub fn build_layer(&self) -> std::io::Result<JsonlLayer> {
        JsonlLayer::new(&self.logs_dir, &self.session)
    }

    /// Install as the global default subscriber and return the log file path.
    pub fn init(self) -> TrackerResult<PathBuf> {
        let jsonl = self.build_layer()?;
        let path = jsonl.log_path().to_path_buf();

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(self.env_filter.as_deref().unwrap_or("info")))
            .map_err(|e| TrackerError::Config(format!("invalid log filter: {}", e)))?;
        let console = self
            .console_output
            .then(|| tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr));

        tracing_subscriber::registry()
            .with(filter)
            .with(jsonl)
            .with(console)
            .try_init()
            .map_err(|e| TrackerError::Config(format!("logging already initialized: {}", e)))?;

        Ok(path)
    }
}
