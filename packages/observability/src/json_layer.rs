//! JSONL layer.
//!
//! Every event becomes one line. The identifiers the node logs with
//! (`peer_id`, `request_id`, `event_id`, `path`) are lifted to top-level keys
//! so a single delivery or peer can be followed with `jq 'select(.requestId == "...")'`.
//! Any other structured field lands under `fields`.

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogLine<'a> {
    timestamp: String,
    level: &'a str,
    service: &'a str,
    target: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    fields: Map<String, Value>,
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    peer_id: Option<String>,
    request_id: Option<String>,
    event_id: Option<String>,
    path: Option<String>,
    fields: Map<String, Value>,
}

impl LineVisitor {
    fn record(&mut self, field: &Field, value: Value) {
        let slot = match field.name() {
            "peer_id" => &mut self.peer_id,
            "request_id" => &mut self.request_id,
            "event_id" => &mut self.event_id,
            "path" => &mut self.path,
            "message" => {
                self.message = text(value);
                return;
            }
            name => {
                self.fields.insert(name.to_string(), value);
                return;
            }
        };
        *slot = Some(text(value));
    }
}

fn text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record(field, Value::String(value.to_string()));
    }
}

pub struct JsonLayer<W> {
    service_name: String,
    make_writer: W,
}

impl<W> JsonLayer<W> {
    pub fn new(service_name: String, make_writer: W) -> Self {
        Self {
            service_name,
            make_writer,
        }
    }
}

impl<S, W> Layer<S> for JsonLayer<W>
where
    S: Subscriber,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        let line = LogLine {
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            level: metadata.level().as_str(),
            service: &self.service_name,
            target: metadata.target(),
            message: visitor.message,
            peer_id: visitor.peer_id,
            request_id: visitor.request_id,
            event_id: visitor.event_id,
            path: visitor.path,
            fields: visitor.fields,
        };

        if let Ok(json) = serde_json::to_string(&line) {
            let _ = writeln!(self.make_writer.make_writer(), "{json}");
        }
    }
}
