//! Tolerant per-field decoding of loosely typed supplier payloads
//!
//! Suppliers send numbers as strings, strings as numbers, and omit fields at
//! will. The rules here are the same for JSON and XML payloads:
//!
//! - a missing or blank field decodes to `0` / empty string
//! - a present field that cannot be interpreted is an error, which makes the
//!   caller drop that one offer
//! - prices must not be negative

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use crate::utils::error::ParseError;

fn invalid(field: &'static str, value: impl Into<String>) -> ParseError {
    ParseError::InvalidField {
        field,
        value: value.into(),
    }
}

// ============================================================================
// Text values
// ============================================================================

/// Parse a non-negative integer, accepting whole-valued decimals like `"2.0"`
pub fn parse_u32(field: &'static str, raw: &str) -> Result<u32, ParseError> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(0);
    }
    if let Ok(v) = text.parse::<u32>() {
        return Ok(v);
    }

    let value = parse_decimal_text(text).ok_or_else(|| invalid(field, raw))?;
    if !value.fract().is_zero() {
        return Err(invalid(field, raw));
    }
    value.to_u32().ok_or_else(|| invalid(field, raw))
}

/// Parse a non-negative price
pub fn parse_price(field: &'static str, raw: &str) -> Result<Decimal, ParseError> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let value = parse_decimal_text(text).ok_or_else(|| invalid(field, raw))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(invalid(field, raw));
    }
    Ok(value)
}

/// Parse a boolean flag (`1`/`0`, `true`/`false`)
pub fn parse_flag(field: &'static str, raw: &str) -> Result<bool, ParseError> {
    match raw.trim().to_lowercase().as_str() {
        "" | "0" | "false" | "no" => Ok(false),
        "1" | "true" | "yes" => Ok(true),
        _ => Err(invalid(field, raw)),
    }
}

fn parse_decimal_text(text: &str) -> Option<Decimal> {
    let text = text.replace(',', ".");
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

// ============================================================================
// JSON values
// ============================================================================

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// String member, empty when missing
pub fn json_str(obj: &Value, key: &str) -> String {
    obj.get(key)
        .and_then(json_text)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Integer member, 0 when missing
pub fn json_u32(obj: &Value, key: &'static str) -> Result<u32, ParseError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(0),
        Some(v) => match json_text(v) {
            Some(text) => parse_u32(key, &text),
            None => Err(invalid(key, v.to_string())),
        },
    }
}

/// Price member, 0 when missing
pub fn json_price(obj: &Value, key: &'static str) -> Result<Decimal, ParseError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(v) => match json_text(v) {
            Some(text) => parse_price(key, &text),
            None => Err(invalid(key, v.to_string())),
        },
    }
}

/// Boolean member, false when missing
pub fn json_flag(obj: &Value, key: &'static str) -> Result<bool, ParseError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(v) => match json_text(v) {
            Some(text) => parse_flag(key, &text),
            None => Err(invalid(key, v.to_string())),
        },
    }
}

/// Array member, empty when missing or not an array
pub fn json_array<'a>(obj: &'a Value, key: &str) -> &'a [Value] {
    obj.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

// ============================================================================
// XML nodes
// ============================================================================

/// First child element with the given local name, ignoring namespaces
pub fn xml_child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

/// All child elements with the given local name
pub fn xml_children<'a, 'input: 'a>(
    node: roxmltree::Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = roxmltree::Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

/// First descendant element with the given local name, including `node` itself
pub fn xml_find<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.descendants()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

/// Concatenated text content of an element
pub fn xml_text(node: roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Child element text, empty when missing
pub fn xml_str(node: roxmltree::Node<'_, '_>, name: &str) -> String {
    xml_child(node, name)
        .map(|c| xml_text(c).trim().to_string())
        .unwrap_or_default()
}

/// Child element integer, 0 when missing
pub fn xml_u32(node: roxmltree::Node<'_, '_>, name: &'static str) -> Result<u32, ParseError> {
    parse_u32(name, &xml_str(node, name))
}

/// Child element price, 0 when missing
pub fn xml_price(node: roxmltree::Node<'_, '_>, name: &'static str) -> Result<Decimal, ParseError> {
    parse_price(name, &xml_str(node, name))
}

/// Child element flag, false when missing
pub fn xml_flag(node: roxmltree::Node<'_, '_>, name: &'static str) -> Result<bool, ParseError> {
    parse_flag(name, &xml_str(node, name))
}
