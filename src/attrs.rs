// Attribute grammar shared by every element handler:
// name = "value" | name = 'value' | name = bare-value | name

use crate::markup::decode_entities;
use crate::number::parse_lenient;
use crate::style::InlineStyle;
use crate::transform::{Matrix, parse_transform};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    items: Vec<(String, String)>,
}

impl Attributes {
    pub fn parse(input: &str) -> Self {
        let bytes = input.as_bytes();
        let mut items = Vec::new();
        let mut i = 0;
        let len = bytes.len();

        while i < len {
            while i < len && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
                i += 1;
            }
            let name_start = i;
            while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' && bytes[i] != b'/'
            {
                i += 1;
            }
            if i == name_start {
                i += 1;
                continue;
            }
            let name = &input[name_start..i];
            while i < len && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= len || bytes[i] != b'=' {
                items.push((name.to_string(), String::new()));
                continue;
            }
            i += 1;
            while i < len && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            let value = if i < len && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                let start = i + 1;
                let end = input[start..]
                    .bytes()
                    .position(|b| b == quote)
                    .map_or(len, |p| start + p);
                i = (end + 1).min(len);
                &input[start..end]
            } else {
                let start = i;
                while i < len && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                &input[start..i]
            };
            items.push((name.to_string(), decode_entities(value).into_owned()));
        }

        Self { items }
    }

    /// ASCII case-insensitive lookup; the first occurrence wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn number(&self, name: &str, default: f64) -> f64 {
        match self.get(name) {
            Some(raw) => parse_lenient(raw),
            None => default,
        }
    }

    pub fn optional_number(&self, name: &str) -> Option<f64> {
        self.get(name).map(parse_lenient)
    }

    pub fn transform(&self) -> Matrix {
        self.get("transform").map(parse_transform).unwrap_or_default()
    }

    pub fn id(&self) -> Option<String> {
        self.get("id")
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// `href`, falling back to `xlink:href`.
    pub fn href(&self) -> Option<&str> {
        self.get("href").or_else(|| self.get("xlink:href"))
    }

    pub fn style(&self) -> InlineStyle {
        self.get("style").map(InlineStyle::parse).unwrap_or_default()
    }

    /// A presentation value. Inline style wins over the attribute.
    pub fn presentation(&self, name: &str, style: &InlineStyle) -> Option<String> {
        style.get(name).map(str::to_string).or_else(|| {
            self.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
    }

    /// Dashed strokes mark construction geometry.
    pub fn is_construction(&self, style: &InlineStyle) -> bool {
        if let Some(dashed) = style.dasharray() {
            return dashed;
        }
        match self.get("stroke-dasharray").map(str::trim) {
            Some(v) if !v.is_empty() => !v.eq_ignore_ascii_case("none"),
            _ => false,
        }
    }
}
