// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! JSON-lines logging on top of `tracing-subscriber`.
//!
//! The logger section lives in its own YAML file:
//!
//! ```yaml
//! logger:
//!   level: "iscsi_initiator_rs=debug,info"
//!   output: file            # stdout | stderr | file
//!   is_show_line: true
//!   is_show_module_path: false
//!   is_show_target: true
//!   file:
//!     path: logs/initiator.log
//!     rotation_frequency: daily   # minutely | hourly | daily | never
//! ```

use std::{collections::HashMap, fs, path::Path, sync::Arc};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{Event, Subscriber, field::Field};
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        self, FmtContext, FormatEvent, FormatFields, FormattedFields,
        format::{FmtSpan, JsonFields, Writer},
    },
    layer::SubscriberExt,
    registry::LookupSpan,
};

#[derive(Debug, Deserialize, Clone)]
struct LoggerFile {
    logger: LogConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// `EnvFilter` directive string.
    #[serde(default = "default_level")]
    pub level: String,
    pub output: LogOutput,
    #[serde(default)]
    pub is_show_line: bool,
    #[serde(default)]
    pub is_show_module_path: bool,
    #[serde(default)]
    pub is_show_target: bool,
    pub file: Option<LogFileConfig>,
}

fn default_level() -> String {
    "info".to_owned()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogFileConfig {
    pub path: String,
    pub rotation_frequency: Option<String>,
}

impl LogFileConfig {
    fn rotation(&self) -> Rotation {
        match self.rotation_frequency.as_deref() {
            Some("minutely") => Rotation::MINUTELY,
            Some("hourly") => Rotation::HOURLY,
            Some("daily") => Rotation::DAILY,
            _ => Rotation::NEVER,
        }
    }

    /// Splits `path` into the appender's directory and file name prefix.
    fn split(&self) -> Result<(&Path, &str)> {
        let path = Path::new(&self.path);
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("log file path {:?} has no file name", self.path))?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        Ok((dir, name))
    }
}

/// Reads the `logger:` section from YAML text.
pub fn parse_logger_config(yaml: &str) -> Result<LogConfig> {
    let f: LoggerFile =
        serde_yaml::from_str(yaml).context("failed to parse logger config")?;
    if f.logger.output == LogOutput::File && f.logger.file.is_none() {
        bail!("logger output is `file` but no `file` section is given");
    }
    Ok(f.logger)
}

/// Formats each event as one JSON object per line.
struct JsonEventFormat {
    config: Arc<LogConfig>,
}

#[derive(Serialize)]
struct LogEntry<'a> {
    timestamp: String,
    level: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    module_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    fields: Map<String, Value>,
}

impl<S, N> FormatEvent<S, N> for JsonEventFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        let mut fields = visitor.fields;

        // Span fields first, so event fields win on a name clash.
        if let Some(scope) = ctx.event_scope() {
            let mut spans = Vec::new();
            for span in scope.from_root() {
                spans.push(span.name());
                if let Some(ext) = span.extensions().get::<FormattedFields<JsonFields>>() {
                    let span_fields: HashMap<String, Value> =
                        serde_json::from_str(&ext.fields).unwrap_or_default();
                    for (k, v) in span_fields {
                        fields.entry(k).or_insert(v);
                    }
                }
            }
            fields.insert("spans".to_owned(), json!(spans));
        }

        let meta = event.metadata();
        let cfg = &self.config;
        let entry = LogEntry {
            timestamp: chrono::Local::now().to_rfc3339(),
            level: meta.level().as_str(),
            target: cfg.is_show_target.then(|| meta.target()),
            module_path: if cfg.is_show_module_path {
                meta.module_path()
            } else {
                None
            },
            line: if cfg.is_show_line { meta.line() } else { None },
            fields,
        };
        let line = serde_json::to_string(&entry).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{line}")
    }
}

#[derive(Default)]
struct JsonVisitor {
    fields: Map<String, Value>,
}

impl tracing::field::Visit for JsonVisitor {
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_owned(), json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_owned(), json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_owned(), json!(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.insert(field.name().to_owned(), json!(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields
            .insert(field.name().to_owned(), json!(format!("{value:?}")));
    }
}

fn make_writer(cfg: &LogConfig) -> Result<(NonBlocking, WorkerGuard)> {
    Ok(match cfg.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File => {
            let file = cfg
                .file
                .as_ref()
                .context("logger output is `file` but no `file` section is given")?;
            let (dir, name) = file.split()?;
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {dir:?}"))?;
            let appender = RollingFileAppender::new(file.rotation(), dir, name);
            tracing_appender::non_blocking(appender)
        },
    })
}

/// Installs the global subscriber described by the YAML file at
/// `config_path`. Keep the returned guard alive for the life of the process,
/// otherwise buffered lines are lost.
pub fn init_logger(config_path: &str) -> Result<WorkerGuard> {
    let yaml = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read logger config {config_path}"))?;
    let cfg = parse_logger_config(&yaml)?;

    let (writer, guard) = make_writer(&cfg)?;
    let env_filter = EnvFilter::try_new(&cfg.level)
        .with_context(|| format!("invalid log level directive {:?}", cfg.level))?;

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .json()
        .event_format(JsonEventFormat {
            config: Arc::new(cfg),
        })
        .fmt_fields(JsonFields::default());

    let subscriber = tracing_subscriber::registry().with(env_filter).with(layer);
    tracing::subscriber::set_global_default(subscriber)
        .context("a global tracing subscriber is already installed")?;

    Ok(guard)
}
