//! The batch request posted by the browser agent.

use crate::error::IngestError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;
use telemetry_details::{ClientDescriptor, TelemetryEvent};
use tracing::{debug, warn};

/// One posted batch: optional session block plus the messages.
///
/// Each message is decoded on its own; one that is not a message object is
/// skipped with a warning and the rest of the batch is kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogRequest {
    #[serde(default, alias = "Session", deserialize_with = "lenient")]
    pub session: Option<SessionDetails>,
    #[serde(
        default,
        rename = "logMessages",
        alias = "LogMessages",
        deserialize_with = "messages"
    )]
    pub log_messages: Vec<TelemetryEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionDetails {
    #[serde(default, alias = "Client", deserialize_with = "lenient")]
    pub client: Option<ClientDescriptor>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(raw) = Option::<Box<RawValue>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match serde_json::from_str(raw.get()) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            debug!("ignoring undecodable session field: {}", e);
            Ok(None)
        }
    }
}

fn messages<'de, D>(deserializer: D) -> Result<Vec<TelemetryEvent>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Box<RawValue>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .iter()
        .enumerate()
        .filter_map(|(index, message)| match TelemetryEvent::from_json(message.get()) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(index, "skipping undecodable log message: {}", e);
                None
            }
        })
        .collect())
}

impl LogRequest {
    pub fn from_slice(body: &[u8]) -> Result<Self, IngestError> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn from_json(text: &str) -> Result<Self, IngestError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Flatten into events ready for rendering.
    ///
    /// The session's client descriptor is copied onto every message that
    /// does not carry its own. With `promote_embedded_json`, text details
    /// holding a JSON object are parsed into structured values.
    pub fn into_events(self, promote_embedded_json: bool) -> Vec<TelemetryEvent> {
        let client = self.session.and_then(|s| s.client);
        self.log_messages
            .into_iter()
            .map(|mut event| {
                if event.client.is_none() {
                    event.client = client.clone();
                }
                if promote_embedded_json {
                    event.user_supplied = event
                        .user_supplied
                        .take()
                        .map(|details| details.promote_embedded_json());
                }
                event
            })
            .collect()
    }
}
