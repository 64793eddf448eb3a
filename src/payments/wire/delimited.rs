//! Flat `KEY=value` sequences joined by a fixed separator.
//!
//! Values are form-encoded (space becomes `+`, `*` is escaped so that it can never
//! collide with the separator). Responses carry the pair sequence inside
//! `#answerstring#...#/answerstring#`, next to a result code and description.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use url::form_urlencoded;

use crate::error::{GatewayError, GatewayResult};
use crate::payments::attributes::Attributes;
use crate::payments::mapping::WireTable;

static RESULT_CODE: LazyLock<Regex> = LazyLock::new(|| envelope_pattern("resultcode"));
static RESULT_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| envelope_pattern("resultdescription"));
static ANSWER_STRING: LazyLock<Regex> = LazyLock::new(|| envelope_pattern("answerstring"));

fn envelope_pattern(marker: &str) -> Regex {
    Regex::new(&format!("(?s)#{marker}#(.*?)#/{marker}#")).expect("static envelope pattern")
}

/// The three top-level components of a delimited response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub result_code: Option<String>,
    pub result_description: Option<String>,
    pub answer: String,
}

impl Envelope {
    /// Locate the envelope markers in a raw body.
    ///
    /// A body without an answer string is malformed. Result code and description
    /// are informational and may be missing.
    pub fn extract(body: &str) -> GatewayResult<Self> {
        let capture = |pattern: &Regex| {
            pattern
                .captures(body)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };

        let answer = capture(&ANSWER_STRING)
            .ok_or_else(|| GatewayError::malformed("answerstring envelope not found"))?;

        Ok(Self {
            result_code: capture(&RESULT_CODE),
            result_description: capture(&RESULT_DESCRIPTION),
            answer,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DelimitedFormat {
    separator: &'static str,
}

impl DelimitedFormat {
    pub const fn new(separator: &'static str) -> Self {
        Self { separator }
    }

    pub fn separator(&self) -> &'static str {
        self.separator
    }

    /// Serialize `attrs` in the table's declared order, skipping absent values,
    /// followed by any custom_info pairs in their original order.
    ///
    /// Mapped and unmapped pairs are not interleaved: a decoded payload where an
    /// unknown key preceded a known one re-encodes with the unknown key moved after
    /// every mapped pair. The pair set survives, the original sequence does not.
    pub fn encode(&self, attrs: &Attributes, table: &WireTable) -> String {
        let mapped = table.entries().filter_map(|(key, field)| {
            attrs
                .get(field)
                .map(|value| format!("{}={}", key, encode_component(value)))
        });
        let custom = attrs
            .custom_info
            .iter()
            .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)));

        mapped.chain(custom).collect::<Vec<_>>().join(self.separator)
    }

    /// Parse a pair sequence. Known keys land on their canonical field (a repeated
    /// key overwrites the earlier value); unknown keys are kept in custom_info.
    pub fn decode(&self, payload: &str, table: &WireTable) -> Attributes {
        let mut attrs = Attributes::new();

        for segment in payload.split(self.separator).filter(|s| !s.is_empty()) {
            let (raw_key, raw_value) = segment.split_once('=').unwrap_or((segment, ""));
            let key = decode_component(raw_key);
            let value = decode_component(raw_value);

            match table.field(&key) {
                Some(field) => attrs.set(field, value.into_owned()),
                None => attrs.push_custom(key.into_owned(), value.into_owned()),
            }
        }

        attrs
    }
}

pub fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
}

pub fn decode_component(value: &str) -> Cow<'_, str> {
    if !value.contains(|c| c == '+' || c == '%') {
        return Cow::Borrowed(value);
    }
    let spaced = value.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => Cow::Owned(decoded.into_owned()),
        Err(_) => Cow::Owned(spaced),
    }
}
