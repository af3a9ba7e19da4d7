// @module: Small helpers shared by the XML readers and writers

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesRef, BytesStart, BytesText};
use std::borrow::Cow;
use std::fmt::Write as _;

/// Escape text for use in element content or attribute values
pub fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}

/// Escape run text, replacing characters XML 1.0 forbids with `_xHHHH_`
pub fn escape_text(text: &str) -> Cow<'_, str> {
    if !text.chars().any(is_restricted) {
        return escape(text);
    }
    let mut cleaned = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if is_restricted(c) {
            let _ = write!(cleaned, "_x{:04X}_", c as u32);
        } else {
            cleaned.push(c);
        }
    }
    Cow::Owned(escape(&cleaned).into_owned())
}

fn is_restricted(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
}

/// Unescaped value of the attribute whose local name matches `name`
pub fn attr_value(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr: &Attribute<'_>| attr.key.local_name().as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok().map(Cow::into_owned))
}

/// Value of the attribute whose full (prefixed) name matches `name`
pub fn attr_value_qualified(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr: &Attribute<'_>| attr.key.as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok().map(Cow::into_owned))
}

/// Text content of a text event, with any escapes resolved
pub fn text_content(text: &BytesText<'_>) -> String {
    let raw = String::from_utf8_lossy(text);
    match quick_xml::escape::unescape(&raw) {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => raw.into_owned(),
    }
}

/// Character produced by an entity or character reference such as `&amp;`
pub fn reference_content(reference: &BytesRef<'_>) -> String {
    let name = String::from_utf8_lossy(reference);
    match quick_xml::escape::unescape(&format!("&{};", name)) {
        Ok(resolved) => resolved.into_owned(),
        Err(_) => String::new(),
    }
}
