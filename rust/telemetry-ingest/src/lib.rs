//! Telemetry Ingest
//!
//! Receives batches posted by the browser agent, renders each message's
//! Details with `telemetry_details`, and hands the entries to a log writer.

pub mod config;
pub mod envelope;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod session;
pub mod writer;

pub use config::IngestConfig;
pub use envelope::LogRequest;
pub use error::{ConfigError, IngestError};
pub use pipeline::Ingestor;
pub use session::{with_session_cookies, SessionPolicy};
pub use writer::{AlertingWriter, LogEntry, LogWriter, MemoryWriter, Subscription, TracingWriter};
