//! Recursive encoding of [`GenericValue`] trees into Details blocks.

use crate::document::Block;
use crate::escape::encode_tag_name;
use crate::value::GenericValue;

/// Encode `value` under the tag `name`.
///
/// Most values produce exactly one block. Arrays produce one same-named
/// block per element, so callers append the whole result.
///
/// * object: container, one child per member in source order
/// * array: one block per element; a nested array becomes a same-named
///   container of its elements; an empty array is a single empty leaf
/// * number / string / boolean: leaf with the canonical text
/// * null: empty leaf
pub fn encode_value(name: &str, value: &GenericValue) -> Vec<Block> {
    let mut out = Vec::with_capacity(1);
    encode_into(&encode_tag_name(name), value, &mut out);
    out
}

fn encode_into(name: &str, value: &GenericValue, out: &mut Vec<Block>) {
    match value {
        GenericValue::Object(members) => {
            let mut children = Vec::with_capacity(members.len());
            for (key, member) in members {
                encode_into(&encode_tag_name(key), member, &mut children);
            }
            out.push(Block::container(name, children));
        }
        GenericValue::Array(items) if items.is_empty() => {
            out.push(Block::leaf(name, ""));
        }
        GenericValue::Array(items) => {
            for item in items {
                match item {
                    GenericValue::Array(_) => {
                        let mut children = Vec::new();
                        encode_into(name, item, &mut children);
                        out.push(Block::container(name, children));
                    }
                    _ => encode_into(name, item, out),
                }
            }
        }
        GenericValue::Number(n) => out.push(Block::leaf(name, n.to_string())),
        GenericValue::String(s) => out.push(Block::leaf(name, s.as_str())),
        GenericValue::Boolean(b) => out.push(Block::leaf(name, b.to_string())),
        GenericValue::Null => out.push(Block::leaf(name, "")),
    }
}
