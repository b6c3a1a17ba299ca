//! The Details block tree and its rendering.

use crate::escape::{escape_text, unescape_text};
use std::fmt;

/// Name of the root container every rendered document is wrapped in.
pub const ROOT_TAG: &str = "Details";

/// One named block of a Details document.
///
/// Leaf text is stored raw; it is escaped when the block is rendered.
/// Names are expected to already be valid tag names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Leaf { name: String, text: String },
    Container { name: String, children: Vec<Block> },
}

impl Block {
    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
        Block::Leaf {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn container(name: impl Into<String>, children: Vec<Block>) -> Self {
        Block::Container {
            name: name.into(),
            children,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Block::Leaf { name, .. } | Block::Container { name, .. } => name,
        }
    }

    /// Children of a container; empty for a leaf.
    pub fn children(&self) -> &[Block] {
        match self {
            Block::Leaf { .. } => &[],
            Block::Container { children, .. } => children,
        }
    }

    /// Append the rendered block to `out`.
    pub fn write_to(&self, out: &mut String) {
        match self {
            Block::Leaf { name, text } => {
                open_tag(out, name);
                out.push_str(&escape_text(text));
                close_tag(out, name);
            }
            Block::Container { name, children } => {
                open_tag(out, name);
                for child in children {
                    child.write_to(out);
                }
                close_tag(out, name);
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }
}

fn open_tag(out: &mut String, name: &str) {
    out.push('<');
    out.push_str(name);
    out.push('>');
}

fn close_tag(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Ordered top-level blocks of one event's Details record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailsDocument {
    blocks: Vec<Block>,
}

impl DetailsDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn extend(&mut self, blocks: impl IntoIterator<Item = Block>) {
        self.blocks.extend(blocks);
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Render as `<Details>…</Details>` with no whitespace between blocks.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(128);
        open_tag(&mut out, ROOT_TAG);
        for block in &self.blocks {
            block.write_to(&mut out);
        }
        close_tag(&mut out, ROOT_TAG);
        out
    }
}

impl fmt::Display for DetailsDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Find the first `<tag>…</tag>` in rendered text and return its unescaped
/// content.
///
/// Intended for reading leaf values back out of a stored Details string.
/// For a container the raw inner markup is returned.
pub fn extract_leaf(rendered: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = rendered.find(&open)? + open.len();
    let len = rendered[start..].find(&close)?;
    Some(unescape_text(&rendered[start..start + len]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document() {
        assert_eq!(DetailsDocument::new().render(), "<Details></Details>");
    }

    #[test]
    fn leaf_text_escaped_once() {
        let block = Block::leaf("Name", "a < b & c");
        assert_eq!(block.render(), "<Name>a &lt; b &amp; c</Name>");
    }

    #[test]
    fn nested_containers_render_in_order() {
        let mut doc = DetailsDocument::new();
        doc.push(Block::container(
            "Outer",
            vec![
                Block::leaf("B", "2"),
                Block::container("Inner", vec![Block::leaf("A", "1")]),
            ],
        ));
        doc.push(Block::leaf("Tail", ""));
        assert_eq!(
            doc.to_string(),
            "<Details><Outer><B>2</B><Inner><A>1</A></Inner></Outer><Tail></Tail></Details>"
        );
    }

    #[test]
    fn extract_leaf_unescapes() {
        let rendered = Block::container("X", vec![Block::leaf("File", "<a&b>.js")]).render();
        assert_eq!(extract_leaf(&rendered, "File").as_deref(), Some("<a&b>.js"));
        assert_eq!(extract_leaf(&rendered, "Line"), None);
    }

    #[test]
    fn block_accessors() {
        let block = Block::container("C", vec![Block::leaf("L", "x")]);
        assert_eq!(block.name(), "C");
        assert_eq!(block.children().len(), 1);
        assert!(block.children()[0].children().is_empty());
    }
}
