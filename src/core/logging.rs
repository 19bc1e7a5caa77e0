//! JSON logger bootstrap.
//!
//! Every record is a single JSON object per line with fixed keys:
//!
//! ```text
//! {"level":"info","time":"2024-05-01T12:00:00.000Z","name":"dapr-client","caller":"client/state.rs:88","msg":"state saved","store":"statestore"}
//! ```
//!
//! [`setup_logger`] registers the process-wide subscriber once at startup.
//! [`build_subscriber`] returns one without installing it, which is what the
//! tests use together with `tracing::subscriber::with_default`.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, SecondsFormat, TimeZone};
use once_cell::sync::OnceCell;
use serde_json::{Map, Number, Value};
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Logger name (tracing target) used by everything the client emits.
pub const LOGGER_NAME: &str = "dapr-client";

/// How the level is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelEncoder {
    /// `info`
    #[default]
    Lowercase,
    /// `INFO`
    Capital,
}

impl LevelEncoder {
    pub fn encode(&self, level: &Level) -> &'static str {
        match self {
            LevelEncoder::Capital => level.as_str(),
            LevelEncoder::Lowercase => match *level {
                Level::TRACE => "trace",
                Level::DEBUG => "debug",
                Level::INFO => "info",
                Level::WARN => "warn",
                _ => "error",
            },
        }
    }
}

/// How the record timestamp is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeEncoder {
    /// `2024-05-01T12:00:00.000+0200`, local time with millisecond precision.
    /// A zero offset renders as `Z`.
    #[default]
    Iso8601,
    /// `2024-05-01T12:00:00+02:00`
    Rfc3339,
    /// Floating point seconds since the Unix epoch.
    EpochSeconds,
}

pub const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";
const ISO8601_UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// ISO8601 with milliseconds; UTC is written as `Z` instead of `+0000`.
pub fn iso8601<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    if at.offset().fix().local_minus_utc() == 0 {
        at.format(ISO8601_UTC_FORMAT).to_string()
    } else {
        at.format(ISO8601_FORMAT).to_string()
    }
}

/// Parses what [`iso8601`] writes.
pub fn parse_iso8601(s: &str) -> Option<DateTime<FixedOffset>> {
    match s.strip_suffix('Z') {
        Some(utc) => NaiveDateTime::parse_from_str(utc, "%Y-%m-%dT%H:%M:%S%.3f")
            .ok()
            .map(|naive| naive.and_utc().fixed_offset()),
        None => DateTime::parse_from_str(s, ISO8601_FORMAT).ok(),
    }
}

impl TimeEncoder {
    pub fn encode(&self, at: DateTime<Local>) -> Value {
        match self {
            TimeEncoder::Iso8601 => Value::String(iso8601(&at)),
            TimeEncoder::Rfc3339 => Value::String(at.to_rfc3339_opts(SecondsFormat::Secs, false)),
            TimeEncoder::EpochSeconds => {
                let secs = at.timestamp() as f64 + f64::from(at.timestamp_subsec_nanos()) / 1e9;
                float(secs)
            }
        }
    }
}

/// How `Duration` field values are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationEncoder {
    /// Floating point seconds.
    #[default]
    Seconds,
    /// Floating point milliseconds.
    Millis,
    /// Integer nanoseconds.
    Nanos,
    /// The human readable form, e.g. `1.5s`.
    String,
}

impl DurationEncoder {
    pub fn encode(&self, d: Duration) -> Value {
        match self {
            DurationEncoder::Seconds => float(d.as_secs_f64()),
            DurationEncoder::Millis => float(d.as_secs_f64() * 1e3),
            DurationEncoder::Nanos => {
                Value::Number(Number::from(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)))
            }
            DurationEncoder::String => Value::String(format!("{d:?}")),
        }
    }
}

/// How the source location is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallerEncoder {
    /// `client/state.rs:88`: parent directory, file and line.
    #[default]
    Short,
    /// `src/client/state.rs:88`
    Full,
}

impl CallerEncoder {
    pub fn encode(&self, file: &str, line: Option<u32>) -> String {
        let path = match self {
            CallerEncoder::Full => file,
            CallerEncoder::Short => short_path(file),
        };
        match line {
            Some(line) => format!("{path}:{line}"),
            None => path.to_string(),
        }
    }
}

fn short_path(file: &str) -> &str {
    let mut seps = file.rmatch_indices(['/', '\\']).map(|(i, _)| i);
    match (seps.next(), seps.next()) {
        (Some(_), Some(parent)) => &file[parent + 1..],
        _ => file,
    }
}

/// Field names and encoders of the JSON output. An empty key drops the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub message_key: String,
    pub level_key: String,
    pub time_key: String,
    pub name_key: String,
    pub caller_key: String,
    pub stacktrace_key: String,
    pub line_ending: String,
    pub encode_level: LevelEncoder,
    pub encode_time: TimeEncoder,
    pub encode_duration: DurationEncoder,
    pub encode_caller: CallerEncoder,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            message_key: "msg".to_string(),
            level_key: "level".to_string(),
            time_key: "time".to_string(),
            name_key: "name".to_string(),
            caller_key: "caller".to_string(),
            stacktrace_key: "stacktrace".to_string(),
            line_ending: "\n".to_string(),
            encode_level: LevelEncoder::Lowercase,
            encode_time: TimeEncoder::Iso8601,
            encode_duration: DurationEncoder::Seconds,
            encode_caller: CallerEncoder::Short,
        }
    }
}

/// Encoder plus level policy.
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    pub encoder: EncoderConfig,
    /// Development mode enables `debug` and attaches stacktraces from `warn` up.
    pub development: bool,
    /// `EnvFilter` directives; the development/production default level when unset.
    pub filter: Option<String>,
}

impl LoggerOptions {
    pub fn development() -> Self {
        Self {
            encoder: EncoderConfig::default(),
            development: true,
            filter: None,
        }
    }

    pub fn production() -> Self {
        Self {
            development: false,
            ..Self::development()
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = if self.development { "debug" } else { "info" };
        self.filter
            .as_deref()
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new(fallback))
    }

    fn stacktrace_level(&self) -> Level {
        if self.development {
            Level::WARN
        } else {
            Level::ERROR
        }
    }
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self::development()
    }
}

/// `FormatEvent` that writes one JSON object per event using an [`EncoderConfig`].
#[derive(Debug, Clone)]
pub struct JsonFormat {
    config: EncoderConfig,
    stacktrace_level: Level,
}

impl JsonFormat {
    pub fn new(config: EncoderConfig, stacktrace_level: Level) -> Self {
        Self {
            config,
            stacktrace_level,
        }
    }

    fn insert(&self, map: &mut Map<String, Value>, key: &str, value: Value) {
        if !key.is_empty() {
            map.insert(key.to_string(), value);
        }
    }

    /// Builds the JSON object for one event, stamped with `now`.
    pub fn encode_event(&self, event: &Event<'_>, now: DateTime<Local>) -> Map<String, Value> {
        let meta = event.metadata();
        let cfg = &self.config;

        let mut visitor = JsonVisitor::new(cfg.encode_duration);
        event.record(&mut visitor);

        let mut map = Map::new();
        self.insert(&mut map, &cfg.level_key, Value::from(cfg.encode_level.encode(meta.level())));
        self.insert(&mut map, &cfg.time_key, cfg.encode_time.encode(now));
        self.insert(&mut map, &cfg.name_key, Value::from(meta.target()));
        if let Some(file) = meta.file() {
            self.insert(&mut map, &cfg.caller_key, Value::from(cfg.encode_caller.encode(file, meta.line())));
        }
        if let Some(message) = visitor.message.take() {
            self.insert(&mut map, &cfg.message_key, Value::from(message));
        }
        for (key, value) in visitor.fields {
            // Fixed keys take precedence over event fields of the same name.
            map.entry(key).or_insert(value);
        }
        if *meta.level() <= self.stacktrace_level {
            let trace = std::backtrace::Backtrace::force_capture().to_string();
            self.insert(&mut map, &cfg.stacktrace_key, Value::from(trace));
        }
        map
    }
}

impl<S, N> FormatEvent<S, N> for JsonFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let map = self.encode_event(event, Local::now());
        let line = serde_json::to_string(&Value::Object(map)).map_err(|_| fmt::Error)?;
        writer.write_str(&line)?;
        writer.write_str(&self.config.line_ending)
    }
}

/// Collects the message and the structured fields of an event.
struct JsonVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
    durations: DurationEncoder,
}

impl JsonVisitor {
    fn new(durations: DurationEncoder) -> Self {
        Self {
            message: None,
            fields: Map::new(),
            durations,
        }
    }

    fn put(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else if !field.name().starts_with("log.") {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for JsonVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, float(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() != "message" {
            if let Some(d) = parse_duration_field(&rendered) {
                let encoded = self.durations.encode(d);
                self.put(field, encoded);
                return;
            }
        }
        self.put(field, Value::from(rendered));
    }
}

/// A `Duration` the JSON logger renders with its duration encoder.
///
/// `tracing` has no duration value type and renders plain `?d` and `%d`
/// fields as text, so durations are marked explicitly:
///
/// ```
/// use std::time::Duration;
/// use dapr_sdk::logging::duration;
///
/// tracing::info!(elapsed = duration(Duration::from_millis(1500)), "done");
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LogDuration(pub Duration);

impl fmt::Debug for LogDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration {{ secs: {}, nanos: {} }}", self.0.as_secs(), self.0.subsec_nanos())
    }
}

/// Marks `d` as a duration field value.
pub fn duration(d: Duration) -> tracing::field::DebugValue<LogDuration> {
    tracing::field::debug(LogDuration(d))
}

/// Reads back the rendering of a [`LogDuration`].
pub fn parse_duration_field(s: &str) -> Option<Duration> {
    let rest = s.strip_prefix("Duration { secs: ")?.strip_suffix(" }")?;
    let (secs, nanos) = rest.split_once(", nanos: ")?;
    let digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    if !digits(secs) || !digits(nanos) {
        return None;
    }
    let nanos: u32 = nanos.parse().ok()?;
    if nanos >= 1_000_000_000 {
        return None;
    }
    Some(Duration::new(secs.parse().ok()?, nanos))
}

fn float(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}

/// Builds the subscriber without installing it.
pub fn build_subscriber<W>(options: LoggerOptions, out: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let format = JsonFormat::new(options.encoder.clone(), options.stacktrace_level());
    tracing_subscriber::fmt()
        .with_env_filter(options.env_filter())
        .event_format(format)
        .with_writer(out)
        .finish()
}

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Installs the process-wide logger with the given options. Only the first
/// call has an effect; returns whether this call installed it.
pub fn init_logger<W>(options: LoggerOptions, out: W) -> bool
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let mut installed = false;
    INSTALLED.get_or_init(|| {
        installed = tracing::subscriber::set_global_default(build_subscriber(options, out)).is_ok();
    });
    if installed {
        tracing::debug!(target: LOGGER_NAME, "logger configured");
    }
    installed
}

/// Configures the development-mode JSON logger writing to `out`.
///
/// `RUST_LOG` overrides the default `debug` level when set.
pub fn setup_logger<W>(out: W)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let options = LoggerOptions {
        filter: std::env::var(EnvFilter::DEFAULT_ENV).ok(),
        ..LoggerOptions::development()
    };
    init_logger(options, out);
}

/// In-memory sink, mostly for capturing log output in tests.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Parses every line written so far as a JSON object.
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.contents()
            .lines()
            .filter_map(|line| match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            })
            .collect()
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log buffer poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = SharedBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
