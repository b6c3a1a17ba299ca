use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetailsError {
    #[error("invalid telemetry event: {0}")]
    Decode(#[from] serde_json::Error),
}
