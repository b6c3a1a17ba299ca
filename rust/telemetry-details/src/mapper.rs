//! Mapping of the known event fields onto the fixed Details layout.

use crate::document::{Block, DetailsDocument};
use crate::encoder::encode_value;
use crate::event::{ClientDescriptor, SourceLocation, TelemetryEvent, UserSupplied};
use crate::value::GenericValue;

/// Rendering of `TimeStamp`: seconds precision, offset kept as `±HH:MM`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Build the Details document for one event.
///
/// Blocks appear in a fixed order, each only when its source is present:
/// `TimeStamp`/`Sequence`, `ClientDetails`, `MethodSourceInfo`,
/// `UserSupplied`. User data always renders as a single `UserSupplied`
/// block; a top-level array lists its elements as `Item` children.
pub fn map_event(event: &TelemetryEvent) -> DetailsDocument {
    let mut doc = DetailsDocument::new();

    match (&event.timestamp, event.sequence) {
        (Some(timestamp), Some(sequence)) => {
            doc.push(Block::leaf(
                "TimeStamp",
                timestamp.format(TIMESTAMP_FORMAT).to_string(),
            ));
            doc.push(Block::leaf("Sequence", sequence.to_string()));
        }
        (None, None) => {}
        (timestamp, sequence) => {
            tracing::debug!(
                has_timestamp = timestamp.is_some(),
                has_sequence = sequence.is_some(),
                "dropping unpaired timestamp/sequence"
            );
        }
    }

    if let Some(client) = &event.client {
        doc.push(client_block(client));
    }

    if let Some(location) = &event.source_location {
        doc.push(source_block(location));
    }

    if let Some(user_supplied) = &event.user_supplied {
        doc.push(user_supplied_block(user_supplied));
    }

    doc
}

/// Render the Details string for one event.
pub fn render_details(event: &TelemetryEvent) -> String {
    map_event(event).render()
}

fn push_text(children: &mut Vec<Block>, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        children.push(Block::leaf(name, value));
    }
}

fn push_number(children: &mut Vec<Block>, name: &str, value: Option<u32>) {
    if let Some(value) = value {
        children.push(Block::leaf(name, value.to_string()));
    }
}

fn client_block(client: &ClientDescriptor) -> Block {
    let mut children = Vec::with_capacity(7);
    push_text(&mut children, "Description", client.description.as_deref());
    push_text(&mut children, "Layout", client.layout.as_deref());
    push_text(&mut children, "Name", client.name.as_deref());
    push_text(&mut children, "UserAgentString", client.user_agent.as_deref());
    push_text(&mut children, "Version", client.version.as_deref());

    if let Some(os) = &client.os {
        let mut os_children = Vec::with_capacity(3);
        push_text(&mut os_children, "Architecture", os.architecture.as_deref());
        push_text(&mut os_children, "Family", os.family.as_deref());
        push_text(&mut os_children, "Version", os.version.as_deref());
        children.push(Block::container("OS", os_children));
    }

    if let Some(size) = &client.size {
        let mut size_children = Vec::with_capacity(2);
        push_number(&mut size_children, "Height", size.height);
        push_number(&mut size_children, "Width", size.width);
        children.push(Block::container("Size", size_children));
    }

    Block::container("ClientDetails", children)
}

fn source_block(location: &SourceLocation) -> Block {
    let mut children = Vec::with_capacity(3);
    push_text(&mut children, "File", location.file.as_deref());
    push_number(&mut children, "Line", location.line);
    push_number(&mut children, "Column", location.column);
    Block::container("MethodSourceInfo", children)
}

/// Tag of each element when the user data is a top-level array.
pub const USER_SUPPLIED_ITEM: &str = "Item";

fn user_supplied_block(user_supplied: &UserSupplied) -> Block {
    match user_supplied {
        UserSupplied::Text(text) => Block::leaf("UserSupplied", text.as_str()),
        UserSupplied::Structured(value @ GenericValue::Array(_)) => {
            Block::container("UserSupplied", encode_value(USER_SUPPLIED_ITEM, value))
        }
        UserSupplied::Structured(value) => encode_value("UserSupplied", value)
            .into_iter()
            .next()
            .unwrap_or_else(|| Block::leaf("UserSupplied", "")),
    }
}
