//! Turns posted batches into log entries.

use crate::envelope::LogRequest;
use crate::writer::{LogEntry, LogWriter};
use chrono::Utc;
use std::sync::Arc;
use telemetry_details::{render_details, GenericValue, TelemetryEvent};
use tracing::debug;

pub struct Ingestor {
    writer: Arc<dyn LogWriter>,
    promote_embedded_json: bool,
}

impl Ingestor {
    pub fn new(writer: Arc<dyn LogWriter>) -> Self {
        Self {
            writer,
            promote_embedded_json: true,
        }
    }

    /// Whether text details holding a JSON object are rendered as tags.
    pub fn with_embedded_json(mut self, enabled: bool) -> Self {
        self.promote_embedded_json = enabled;
        self
    }

    /// Render and write every message of `request`. Returns the number of
    /// entries written.
    pub fn ingest(&self, request: LogRequest, session_id: Option<&str>) -> usize {
        let events = request.into_events(self.promote_embedded_json);
        let count = events.len();
        for event in &events {
            self.writer.write(entry_for(event, session_id));
        }
        debug!(count, session = session_id.unwrap_or("-"), "ingested log request");
        count
    }
}

/// Build the log entry for one event.
pub fn entry_for(event: &TelemetryEvent, session_id: Option<&str>) -> LogEntry {
    let description = match &event.parameters {
        Some(parameters) => format_description(&event.description, parameters),
        None => event.description.clone(),
    };
    LogEntry {
        severity: event.severity,
        category: event.category.clone(),
        caption: event.caption.clone(),
        description,
        session_id: session_id.map(str::to_string),
        exception: event.exception.clone(),
        received_at: Utc::now(),
        details: render_details(event),
    }
}

/// Substitute `{0}`, `{1}`, … with the matching parameter's text.
///
/// `{{` and `}}` produce literal braces. Placeholders without a matching
/// parameter, and anything else in braces, are copied through unchanged.
pub fn format_description(template: &str, parameters: &[GenericValue]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if rest.starts_with("{{") || rest.starts_with("}}") {
            out.push_str(&rest[..1]);
            rest = &rest[2..];
            continue;
        }
        if rest.starts_with('}') {
            out.push('}');
            rest = &rest[1..];
            continue;
        }

        let substituted = rest[1..].find('}').and_then(|end| {
            let index: usize = rest[1..1 + end].parse().ok()?;
            let text = parameter_text(parameters.get(index)?);
            Some((text, end + 2))
        });
        match substituted {
            Some((text, consumed)) => {
                out.push_str(&text);
                rest = &rest[consumed..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn parameter_text(value: &GenericValue) -> String {
    value
        .scalar_text()
        .unwrap_or_else(|| value.to_json_value().to_string())
}
