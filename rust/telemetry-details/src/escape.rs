//! Escaping for the tagged Details text format.
//!
//! Leaf text is escaped exactly once, when a [`crate::DetailsDocument`] is
//! rendered. Everything upstream of rendering handles raw text.

use std::borrow::Cow;

const ENTITIES: [(char, &str); 5] = [
    ('&', "&amp;"),
    ('<', "&lt;"),
    ('>', "&gt;"),
    ('"', "&quot;"),
    ('\'', "&apos;"),
];

fn entity_for(ch: char) -> Option<&'static str> {
    ENTITIES
        .iter()
        .find(|(c, _)| *c == ch)
        .map(|(_, entity)| *entity)
}

/// Escape the five structural characters (`<`, `>`, `&`, `'`, `"`).
///
/// Borrows the input when nothing needs escaping.
pub fn escape_text(s: &str) -> Cow<'_, str> {
    let Some(first) = s.find(|c: char| entity_for(c).is_some()) else {
        return Cow::Borrowed(s);
    };

    let mut out = String::with_capacity(s.len() + 8);
    out.push_str(&s[..first]);
    for ch in s[first..].chars() {
        match entity_for(ch) {
            Some(entity) => out.push_str(entity),
            None => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Inverse of [`escape_text`].
///
/// Only the five entities produced by [`escape_text`] are recognised; any
/// other `&` sequence is kept verbatim.
pub fn unescape_text(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match ENTITIES.iter().find(|(_, entity)| rest.starts_with(entity)) {
            Some((ch, entity)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Tag written for a member with an empty name.
pub const EMPTY_NAME_TAG: &str = "_x_";

/// Map an arbitrary member name onto a well-formed tag name.
///
/// Characters that cannot appear in a tag name are written as `_xHHHH_`
/// (upper-case hex code point, eight digits above U+FFFF). So is the `_` of
/// a literal `_x` and the first letter of a name starting with the reserved
/// `xml` prefix. The mapping is reversed by [`decode_tag_name`].
pub fn encode_tag_name(name: &str) -> Cow<'_, str> {
    if name.is_empty() {
        return Cow::Borrowed(EMPTY_NAME_TAG);
    }
    let reserved = name
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("xml"));
    let valid = !reserved
        && !name.contains("_x")
        && name
            .chars()
            .enumerate()
            .all(|(i, ch)| is_name_char(ch, i == 0));
    if valid {
        return Cow::Borrowed(name);
    }

    let mut out = String::with_capacity(name.len() + 8);
    let mut chars = name.chars().peekable();
    let mut first = true;
    while let Some(ch) = chars.next() {
        let escape = (first && reserved)
            || !is_name_char(ch, first)
            || (ch == '_' && chars.peek() == Some(&'x'));
        if escape {
            push_code_point(&mut out, ch);
        } else {
            out.push(ch);
        }
        first = false;
    }
    Cow::Owned(out)
}

fn push_code_point(out: &mut String, ch: char) {
    let code = ch as u32;
    if code > 0xFFFF {
        out.push_str(&format!("_x{:08X}_", code));
    } else {
        out.push_str(&format!("_x{:04X}_", code));
    }
}

/// Inverse of [`encode_tag_name`].
pub fn decode_tag_name(tag: &str) -> Cow<'_, str> {
    if tag == EMPTY_NAME_TAG {
        return Cow::Borrowed("");
    }
    if !tag.contains("_x") {
        return Cow::Borrowed(tag);
    }

    let mut out = String::with_capacity(tag.len());
    let mut rest = tag;
    while let Some(pos) = rest.find("_x") {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match code_point_at(rest) {
            Some((ch, len)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push_str("_x");
                rest = &rest[2..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Parse a `_xHHHH_` or `_xHHHHHHHH_` sequence at the start of `s`.
fn code_point_at(s: &str) -> Option<(char, usize)> {
    [4, 8].into_iter().find_map(|width| {
        let end = 2 + width;
        if s.as_bytes().get(end) != Some(&b'_') {
            return None;
        }
        let hex = s.get(2..end)?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let ch = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)?;
        Some((ch, end + 1))
    })
}

fn is_name_char(ch: char, first: bool) -> bool {
    if ch.is_alphabetic() || ch == '_' {
        return true;
    }
    !first && (ch.is_numeric() || ch == '-' || ch == '.')
}
