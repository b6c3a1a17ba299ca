//! Telemetry Details
//!
//! Renders a decoded client telemetry event into its canonical `Details`
//! text: a fixed layout for the known fields followed by the user-supplied
//! data encoded as nested tags. Rendering is pure and deterministic; equal
//! events always produce byte-identical text.

pub mod document;
pub mod encoder;
pub mod error;
pub mod escape;
pub mod event;
pub mod mapper;
pub mod value;

pub use document::{extract_leaf, Block, DetailsDocument};
pub use encoder::encode_value;
pub use error::DetailsError;
pub use event::{
    ClientDescriptor, ExceptionInfo, OsDescriptor, Severity, SourceLocation, TelemetryEvent,
    UserSupplied, ViewportSize,
};
pub use mapper::{map_event, render_details};
pub use value::GenericValue;
