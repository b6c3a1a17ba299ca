//! Decoded telemetry event model.
//!
//! Deserialization follows the message shape posted by the browser agent
//! and is forgiving: a field that cannot be interpreted is treated as
//! absent instead of failing the whole event. Events are decoded from JSON
//! text; each field is captured raw and then decoded on its own.

use crate::error::DetailsError;
use crate::value::GenericValue;
use chrono::{DateTime, FixedOffset};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::fmt;

// =============================================================================
// Severity
// =============================================================================

/// Event severity. Wire codes follow the agent's numeric levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Severity {
    Critical,
    Error,
    Warning,
    #[default]
    Information,
    Verbose,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Information,
        Severity::Verbose,
    ];

    pub fn code(self) -> i64 {
        match self {
            Severity::Critical => 1,
            Severity::Error => 2,
            Severity::Warning => 4,
            Severity::Information => 8,
            Severity::Verbose => 16,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "information",
            Severity::Verbose => "verbose",
        }
    }

    /// Case-insensitive name lookup; `info` is accepted for `information`.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        if lower == "info" {
            return Some(Severity::Information);
        }
        Self::ALL.into_iter().find(|s| s.name() == lower)
    }

    /// True when `self` is as severe as `threshold` or more.
    pub fn is_at_least(self, threshold: Severity) -> bool {
        self.code() <= threshold.code()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts either the numeric code or the name. Unknown values are errors.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match GenericValue::deserialize(deserializer)? {
            GenericValue::Number(n) => n
                .as_i64()
                .and_then(Severity::from_code)
                .ok_or_else(|| de::Error::custom(format!("unknown severity code {n}"))),
            GenericValue::String(name) => Severity::from_name(&name)
                .ok_or_else(|| de::Error::custom(format!("unknown severity '{name}'"))),
            other => Err(de::Error::custom(format!(
                "expected a severity code or name, found {}",
                other.kind()
            ))),
        }
    }
}

// =============================================================================
// Event parts
// =============================================================================

/// Browser/client description reported with the session.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDescriptor {
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub layout: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, rename = "ua", alias = "userAgent", deserialize_with = "lenient::text")]
    pub user_agent: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient::nested")]
    pub os: Option<OsDescriptor>,
    #[serde(default, deserialize_with = "lenient::nested")]
    pub size: Option<ViewportSize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OsDescriptor {
    #[serde(default, deserialize_with = "lenient::text")]
    pub architecture: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub family: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ViewportSize {
    #[serde(default, deserialize_with = "lenient::unsigned")]
    pub width: Option<u32>,
    #[serde(default, deserialize_with = "lenient::unsigned")]
    pub height: Option<u32>,
}

/// Where in the client script the event was raised.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SourceLocation {
    #[serde(default, deserialize_with = "lenient::text")]
    pub file: Option<String>,
    #[serde(default, deserialize_with = "lenient::unsigned")]
    pub line: Option<u32>,
    #[serde(default, deserialize_with = "lenient::unsigned")]
    pub column: Option<u32>,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: Some(file.into()),
            line: Some(line),
            column: Some(column),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.line.is_none() && self.column.is_none()
    }
}

/// Script error captured alongside the event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionInfo {
    #[serde(default, deserialize_with = "lenient::text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient::lines")]
    pub stack_trace: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub cause: Option<String>,
    #[serde(default, deserialize_with = "lenient::unsigned")]
    pub line: Option<u32>,
    #[serde(default, deserialize_with = "lenient::unsigned")]
    pub column: Option<u32>,
}

impl ExceptionInfo {
    pub fn is_empty(&self) -> bool {
        self.message.is_none()
            && self.url.is_none()
            && self.stack_trace.is_empty()
            && self.cause.is_none()
            && self.line.is_none()
            && self.column.is_none()
    }
}

/// Free-form data attached by the calling script.
#[derive(Debug, Clone, PartialEq)]
pub enum UserSupplied {
    /// Plain text, rendered verbatim (escaped).
    Text(String),
    /// Parsed JSON, rendered through the value encoder.
    Structured(GenericValue),
}

impl UserSupplied {
    /// Turn text holding a strict JSON object into a structured value.
    ///
    /// Anything else, including malformed JSON, stays as text.
    pub fn promote_embedded_json(self) -> Self {
        let UserSupplied::Text(text) = self else {
            return self;
        };
        if !text.trim_start().starts_with('{') {
            return UserSupplied::Text(text);
        }
        match GenericValue::from_json_text(&text) {
            Ok(value @ GenericValue::Object(_)) => UserSupplied::Structured(value),
            Ok(_) => UserSupplied::Text(text),
            Err(e) => {
                tracing::debug!("user supplied details kept as text: {}", e);
                UserSupplied::Text(text)
            }
        }
    }
}

// =============================================================================
// TelemetryEvent
// =============================================================================

/// One client-reported log record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    #[serde(default, deserialize_with = "lenient::severity")]
    pub severity: Severity,
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub category: String,
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub caption: String,
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub description: String,
    /// Positional arguments for `{0}`-style placeholders in `description`.
    #[serde(default, deserialize_with = "lenient::parameters")]
    pub parameters: Option<Vec<GenericValue>>,
    #[serde(default, rename = "timeStamp", alias = "timestamp", deserialize_with = "lenient::timestamp")]
    pub timestamp: Option<DateTime<FixedOffset>>,
    #[serde(default, deserialize_with = "lenient::sequence")]
    pub sequence: Option<u64>,
    #[serde(
        default,
        rename = "methodSourceInfo",
        alias = "sourceLocation",
        deserialize_with = "lenient::source_location"
    )]
    pub source_location: Option<SourceLocation>,
    #[serde(default, deserialize_with = "lenient::nested")]
    pub client: Option<ClientDescriptor>,
    #[serde(
        default,
        rename = "details",
        alias = "userSupplied",
        deserialize_with = "lenient::user_supplied"
    )]
    pub user_supplied: Option<UserSupplied>,
    #[serde(default, deserialize_with = "lenient::exception")]
    pub exception: Option<ExceptionInfo>,
}

impl TelemetryEvent {
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        caption: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            caption: caption.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Decode one message object.
    pub fn from_json(text: &str) -> Result<Self, DetailsError> {
        Ok(serde_json::from_str(text)?)
    }
}

// =============================================================================
// Lenient field decoding
// =============================================================================

mod lenient {
    use super::*;
    use serde::de::DeserializeOwned;
    use serde_json::value::RawValue;

    fn raw<'de, D>(deserializer: D) -> Result<Option<Box<RawValue>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Box<RawValue>>::deserialize(deserializer)
    }

    fn decode<T: DeserializeOwned>(raw: &RawValue) -> Option<T> {
        match serde_json::from_str(raw.get()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("ignoring undecodable field: {}", e);
                None
            }
        }
    }

    fn generic<'de, D>(deserializer: D) -> Result<Option<GenericValue>, D::Error>
    where
        D: Deserializer<'de>,
    {
        nested(deserializer)
    }

    /// A nested object, or `None` when it has the wrong shape.
    pub fn nested<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(raw(deserializer)?.and_then(|raw| decode(&raw)))
    }

    fn scalar_text(value: GenericValue) -> Option<String> {
        match value {
            GenericValue::String(s) => Some(s),
            GenericValue::Number(n) => Some(n.to_string()),
            GenericValue::Boolean(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn as_u64(value: &GenericValue) -> Option<u64> {
        match value {
            GenericValue::Number(n) => n.as_u64(),
            GenericValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(generic(deserializer)?.and_then(scalar_text))
    }

    pub fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(text(deserializer)?.unwrap_or_default())
    }

    pub fn unsigned<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(generic(deserializer)?
            .as_ref()
            .and_then(as_u64)
            .and_then(|n| u32::try_from(n).ok()))
    }

    pub fn sequence<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(generic(deserializer)?.as_ref().and_then(as_u64))
    }

    pub fn severity<'de, D>(deserializer: D) -> Result<Severity, D::Error>
    where
        D: Deserializer<'de>,
    {
        let severity = match generic(deserializer)? {
            Some(GenericValue::Number(n)) => n.as_i64().and_then(Severity::from_code),
            Some(GenericValue::String(s)) => Severity::from_name(&s)
                .or_else(|| s.trim().parse().ok().and_then(Severity::from_code)),
            _ => None,
        };
        Ok(severity.unwrap_or_default())
    }

    pub fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(GenericValue::String(raw)) = generic(deserializer)? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(ts) => Ok(Some(ts)),
            Err(e) => {
                tracing::debug!("ignoring unparseable timestamp '{}': {}", raw, e);
                Ok(None)
            }
        }
    }

    pub fn parameters<'de, D>(deserializer: D) -> Result<Option<Vec<GenericValue>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match generic(deserializer)? {
            None | Some(GenericValue::Null) => None,
            Some(GenericValue::Array(items)) => Some(items),
            Some(other) => Some(vec![other]),
        })
    }

    /// Data that cannot be decoded, such as nesting too deep for the
    /// parser, is kept as its raw JSON text.
    pub fn user_supplied<'de, D>(deserializer: D) -> Result<Option<UserSupplied>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = raw(deserializer)? else {
            return Ok(None);
        };
        Ok(match serde_json::from_str::<GenericValue>(raw.get()) {
            Ok(GenericValue::Null) => None,
            Ok(GenericValue::String(s)) => Some(UserSupplied::Text(s)),
            Ok(value) => Some(UserSupplied::Structured(value)),
            Err(e) => {
                tracing::debug!("user supplied details kept as raw text: {}", e);
                Some(UserSupplied::Text(raw.get().to_string()))
            }
        })
    }

    pub fn source_location<'de, D>(deserializer: D) -> Result<Option<SourceLocation>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let location: Option<SourceLocation> = nested(deserializer)?;
        Ok(location.filter(|l| !l.is_empty()))
    }

    pub fn exception<'de, D>(deserializer: D) -> Result<Option<ExceptionInfo>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let exception: Option<ExceptionInfo> = nested(deserializer)?;
        Ok(exception.filter(|e| !e.is_empty()))
    }

    pub fn lines<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match generic(deserializer)? {
            Some(GenericValue::Array(items)) => items.into_iter().filter_map(scalar_text).collect(),
            Some(GenericValue::String(s)) => s.lines().map(str::to_string).collect(),
            _ => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_codes_round_trip() {
        for severity in Severity::ALL {
            assert_eq!(Severity::from_code(severity.code()), Some(severity));
            assert_eq!(Severity::from_name(severity.name()), Some(severity));
        }
        assert_eq!(Severity::from_code(3), None);
        assert_eq!(Severity::from_name("INFO"), Some(Severity::Information));
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical.is_at_least(Severity::Warning));
        assert!(Severity::Warning.is_at_least(Severity::Warning));
        assert!(!Severity::Verbose.is_at_least(Severity::Warning));
    }

    #[test]
    fn severity_strict_deserialize() {
        assert_eq!(serde_json::from_str::<Severity>("4").unwrap(), Severity::Warning);
        assert_eq!(
            serde_json::from_str::<Severity>("\"error\"").unwrap(),
            Severity::Error
        );
        assert!(serde_json::from_str::<Severity>("5").is_err());
    }

    #[test]
    fn decode_agent_message() {
        let event = TelemetryEvent::from_json(
            r#"{"severity": 4, "category": "Test", "caption": "test log",
                "description": "tests logs message", "paramters": null,
                "details": null, "exception": {},
                "methodSourceInfo": {"file": "app.js", "line": 3, "column": 5},
                "timeStamp": "2015-04-09T14:32:10-07:00", "sequence": 1}"#,
        )
        .unwrap();

        assert_eq!(event.severity, Severity::Warning);
        assert_eq!(event.category, "Test");
        assert_eq!(event.sequence, Some(1));
        assert_eq!(
            event.timestamp.map(|t| t.offset().local_minus_utc()),
            Some(-7 * 3600)
        );
        assert_eq!(event.source_location, Some(SourceLocation::new("app.js", 3, 5)));
        assert_eq!(event.exception, None);
        assert_eq!(event.user_supplied, None);
    }

    #[test]
    fn decode_is_forgiving() {
        let event = TelemetryEvent::from_json(
            r#"{"severity": 99, "caption": null, "timeStamp": "yesterday",
                "sequence": -1, "methodSourceInfo": {}}"#,
        )
        .unwrap();

        assert_eq!(event.severity, Severity::Information);
        assert_eq!(event.caption, "");
        assert_eq!(event.timestamp, None);
        assert_eq!(event.sequence, None);
        assert_eq!(event.source_location, None);
    }

    #[test]
    fn decode_user_supplied_shapes() {
        let text = TelemetryEvent::from_json(r#"{"details": "plain"}"#).unwrap();
        assert_eq!(text.user_supplied, Some(UserSupplied::Text("plain".into())));

        let structured = TelemetryEvent::from_json(r#"{"details": {"a": 1}}"#).unwrap();
        assert!(matches!(
            structured.user_supplied,
            Some(UserSupplied::Structured(GenericValue::Object(_)))
        ));
    }

    #[test]
    fn decode_client_descriptor_numbers_as_text() {
        let client: ClientDescriptor = serde_json::from_str(
            r#"{"ua": "Mozilla/5.0", "os": {"architecture": 64, "family": "Windows"},
                "size": {"width": 1102, "height": 873}, "manufacturer": null}"#,
        )
        .unwrap();
        assert_eq!(client.user_agent.as_deref(), Some("Mozilla/5.0"));
        let os = client.os.unwrap();
        assert_eq!(os.architecture.as_deref(), Some("64"));
        assert_eq!(os.version, None);
        assert_eq!(client.size.unwrap().height, Some(873));
    }

    #[test]
    fn decode_exception() {
        let event = TelemetryEvent::from_json(
            r#"{"exception": {"message": "x is undefined", "url": "http://host/app.js",
                "stackTrace": ["at f (app.js:1:2)", "at g (app.js:3:4)"], "line": 1}}"#,
        )
        .unwrap();
        let exception = event.exception.unwrap();
        assert_eq!(exception.message.as_deref(), Some("x is undefined"));
        assert_eq!(exception.stack_trace.len(), 2);
        assert_eq!(exception.line, Some(1));
    }

    #[test]
    fn wrongly_typed_nested_fields_are_absent() {
        let event = TelemetryEvent::from_json(
            r#"{"caption": "kept", "exception": "TypeError: x is undefined",
                "methodSourceInfo": "app.js:3", "client": "Firefox 37",
                "details": "keep me"}"#,
        )
        .unwrap();

        assert_eq!(event.caption, "kept");
        assert_eq!(event.exception, None);
        assert_eq!(event.source_location, None);
        assert_eq!(event.client, None);
        assert_eq!(event.user_supplied, Some(UserSupplied::Text("keep me".into())));
    }

    #[test]
    fn wrongly_typed_client_parts_are_absent() {
        let client: ClientDescriptor =
            serde_json::from_str(r#"{"name": "Firefox", "os": "Windows", "size": 1024}"#).unwrap();
        assert_eq!(client.name.as_deref(), Some("Firefox"));
        assert_eq!(client.os, None);
        assert_eq!(client.size, None);
    }

    #[test]
    fn out_of_range_number_keeps_event() {
        let event = TelemetryEvent::from_json(
            r#"{"timeStamp": "2015-04-09T14:32:10-07:00", "sequence": 1,
                "details": {"big": 1e400}}"#,
        )
        .unwrap();
        assert_eq!(event.sequence, Some(1));
        assert!(event.timestamp.is_some());
        let Some(UserSupplied::Structured(value)) = event.user_supplied else {
            panic!("expected structured details");
        };
        assert_eq!(
            value.get("big").and_then(GenericValue::scalar_text).as_deref(),
            Some("1e400")
        );
    }

    #[test]
    fn too_deep_details_fall_back_to_text() {
        let deep = format!("{}1{}", "[".repeat(200), "]".repeat(200));
        let event =
            TelemetryEvent::from_json(&format!(r#"{{"caption": "deep", "details": {deep}}}"#))
                .unwrap();
        assert_eq!(event.caption, "deep");
        assert_eq!(event.user_supplied, Some(UserSupplied::Text(deep)));
    }

    #[test]
    fn severity_deserialize_rejects_containers() {
        assert!(serde_json::from_str::<Severity>("[4]").is_err());
        assert!(serde_json::from_str::<Severity>("\"loud\"").is_err());
    }

    #[test]
    fn promote_embedded_object() {
        let promoted = UserSupplied::Text(r#" {"a": 1}"#.into()).promote_embedded_json();
        assert!(matches!(promoted, UserSupplied::Structured(_)));

        let array = UserSupplied::Text("[1, 2]".into()).promote_embedded_json();
        assert_eq!(array, UserSupplied::Text("[1, 2]".into()));

        let malformed = UserSupplied::Text("{ not: json".into()).promote_embedded_json();
        assert_eq!(malformed, UserSupplied::Text("{ not: json".into()));
    }
}
