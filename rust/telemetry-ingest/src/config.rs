//! Configuration file parsing for `telemetry.toml`.
//!
//! Searches the current directory then its ancestors. Every setting has a
//! default, so a missing file is not an error.

use crate::error::ConfigError;
use crate::session::{default_extensions, SessionPolicy, DEFAULT_COOKIE_NAME};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use telemetry_details::Severity;

pub const CONFIG_FILE_NAME: &str = "telemetry.toml";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct IngestConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub details: DetailsSection,
    #[serde(default)]
    pub alerts: AlertSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    /// Path the agent posts batches to.
    pub endpoint: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            endpoint: "/loupe/log".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionSection {
    pub cookie_name: String,
    pub extensions: Vec<String>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DetailsSection {
    pub parse_embedded_json: bool,
}

impl Default for DetailsSection {
    fn default() -> Self {
        Self {
            parse_embedded_json: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertSection {
    /// Name (`"warning"`) or numeric code (`4`).
    pub min_severity: Severity,
}

impl Default for AlertSection {
    fn default() -> Self {
        Self {
            min_severity: Severity::Warning,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LogSection {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            filter: "telemetry_ingest=info,telemetry=info,tower_http=info".to_string(),
        }
    }
}

impl IngestConfig {
    /// Load `telemetry.toml` from the current dir or its parents.
    /// Returns `Default` when no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a TOML string directly.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    fn find() -> Option<PathBuf> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Apply `PORT` from the environment to the bind address.
    pub fn apply_env(&mut self) {
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.set_port(port);
        }
    }

    fn set_port(&mut self, port: u16) {
        let host = self
            .server
            .bind
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or("0.0.0.0");
        self.server.bind = format!("{}:{}", host, port);
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(self.server.bind.clone()))
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy::new(
            self.session.cookie_name.clone(),
            self.session.extensions.clone(),
        )
    }

    /// A commented `telemetry.toml` with every default spelled out.
    pub fn default_template() -> &'static str {
        r#"[server]
bind = "0.0.0.0:3000"
endpoint = "/loupe/log"

[session]
cookie_name = "LoupeSessionId"
# "" matches paths without an extension
extensions = [".html", ".htm", ".aspx", ""]

[details]
# Render text details that hold a JSON object as nested tags
parse_embedded_json = true

[alerts]
# Entries at or above this severity are delivered to alert observers
min_severity = "warning"

[log]
filter = "telemetry_ingest=info,telemetry=info,tower_http=info"
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = IngestConfig::from_toml("").unwrap();
        assert_eq!(config.server.endpoint, "/loupe/log");
        assert_eq!(config.session.cookie_name, "LoupeSessionId");
        assert!(config.details.parse_embedded_json);
        assert_eq!(config.alerts.min_severity, Severity::Warning);
    }

    #[test]
    fn template_matches_defaults() {
        let config = IngestConfig::from_toml(IngestConfig::default_template()).unwrap();
        let defaults = IngestConfig::default();
        assert_eq!(config.server.bind, defaults.server.bind);
        assert_eq!(config.session.extensions, defaults.session.extensions);
        assert_eq!(config.alerts.min_severity, defaults.alerts.min_severity);
        assert_eq!(config.log.filter, defaults.log.filter);
    }

    #[test]
    fn partial_sections() {
        let config = IngestConfig::from_toml(
            r#"
[server]
endpoint = "/telemetry"

[alerts]
min_severity = 2
"#,
        )
        .unwrap();
        assert_eq!(config.server.endpoint, "/telemetry");
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert_eq!(config.alerts.min_severity, Severity::Error);
    }

    #[test]
    fn unknown_severity_rejected() {
        assert!(IngestConfig::from_toml("[alerts]\nmin_severity = \"loud\"").is_err());
    }

    #[test]
    fn port_override_keeps_host() {
        let mut config = IngestConfig::default();
        config.server.bind = "127.0.0.1:8080".to_string();
        config.set_port(9000);
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn invalid_bind_reported() {
        let mut config = IngestConfig::default();
        config.server.bind = "nowhere".to_string();
        assert!(matches!(
            config.bind_addr(),
            Err(ConfigError::InvalidBind(_))
        ));
    }

    #[test]
    fn load_from_missing_file() {
        let err = IngestConfig::load_from(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
