// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wavefront line decoder.
//!
//! Line format:
//! ```text
//! <namespace.metric.path> <value> [<epoch-seconds>] [<tag>=<value> ...]
//! ```
//!
//! The timestamp is optional and detected positionally: if the third token
//! parses as an integer it is the timestamp, otherwise it is the first tag.
//! A numeric tag placed right after the value is therefore read as a
//! timestamp.

use crate::metric::{FieldValue, Metric};
use crate::tokenizer::{is_quotation_mark, Tokenizer};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Value literals that invalidate a whole line.
pub const INVALID_LITERALS: &[&str] = &["nan", "Infinity", "null", "NaN"];

/// Reasons a line is discarded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("expected at least 2 tokens, got {0}")]
    TooFewTokens(usize),

    #[error("metric name is not namespaced: {0}")]
    NotNamespaced(String),

    #[error("invalid value literal: {0}")]
    InvalidLiteral(String),

    #[error("value is neither numeric nor boolean: {0}")]
    NotNumeric(String),
}

/// Result of decoding one line.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// The decoded record.
    pub metric: Metric,
    /// Tag tokens that were skipped because they had no usable `key=value` form.
    pub skipped_tags: Vec<String>,
}

/// Decodes raw lines into [`Metric`] records.
#[derive(Debug, Clone, Default)]
pub struct LineDecoder {
    tokenizer: Tokenizer,
}

impl LineDecoder {
    /// Create a decoder.
    pub fn new() -> Self {
        Self {
            tokenizer: Tokenizer::new(),
        }
    }

    /// Tokenize and decode a raw line.
    pub fn decode_line(&self, line: &str) -> Result<Decoded, DecodeError> {
        let tokens = self.tokenizer.tokenize(line);
        decode_tokens(&tokens)
    }
}

/// Decode an already tokenized line.
pub fn decode_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Decoded, DecodeError> {
    if tokens.len() < 2 {
        return Err(DecodeError::TooFewTokens(tokens.len()));
    }

    let path = tokens[0].as_ref();
    let (name, field_key) = match path.split_once('.') {
        Some((name, rest)) => (name, rest),
        None => return Err(DecodeError::NotNamespaced(path.to_string())),
    };

    let literal = tokens[1].as_ref();
    if INVALID_LITERALS.contains(&literal) {
        return Err(DecodeError::InvalidLiteral(literal.to_string()));
    }
    let value =
        parse_value(literal).ok_or_else(|| DecodeError::NotNumeric(literal.to_string()))?;

    let (timestamp, tag_start) = match tokens.get(2).map(|t| t.as_ref()) {
        Some(token) => match token.parse::<i64>() {
            Ok(secs) => (epoch_seconds(path, secs), 3),
            Err(_) => (None, 2),
        },
        None => (None, 2),
    };

    let mut tags = HashMap::new();
    let mut skipped_tags = Vec::new();
    for raw in &tokens[tag_start..] {
        let raw = raw.as_ref();
        match parse_tag(raw) {
            Some((key, value)) => {
                tags.insert(key, value);
            }
            None => {
                debug!("Malformed tag on metric {}: {}", path, raw);
                skipped_tags.push(raw.to_string());
            }
        }
    }

    let mut fields = HashMap::with_capacity(1);
    fields.insert(field_key.to_string(), value);

    Ok(Decoded {
        metric: Metric {
            name: name.to_string(),
            fields,
            tags,
            timestamp,
        },
        skipped_tags,
    })
}

/// Accept a literal as a float, falling back to a boolean.
pub fn parse_value(literal: &str) -> Option<FieldValue> {
    if let Ok(v) = literal.parse::<f64>() {
        return Some(FieldValue::Float(v));
    }
    parse_bool(literal).map(FieldValue::Boolean)
}

/// Boolean literals accepted on the wire.
fn parse_bool(literal: &str) -> Option<bool> {
    match literal {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Convert epoch seconds to an instant.
///
/// The token still occupies the timestamp position when the instant is out
/// of range; only the timestamp itself is dropped.
fn epoch_seconds(path: &str, secs: i64) -> Option<DateTime<Utc>> {
    let timestamp = DateTime::from_timestamp(secs, 0);
    if timestamp.is_none() {
        debug!("Timestamp {} on metric {} is out of range, dropped", secs, path);
    }
    timestamp
}

/// Remove one pair of identical quotation marks wrapping `s`.
fn unquote(s: &str) -> &str {
    let mut chars = s.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open), Some(close)) if open == close && is_quotation_mark(open) => chars.as_str(),
        _ => s,
    }
}

/// Split a tag token on its first `=`, unwrapping quoted keys and values.
fn parse_tag(raw: &str) -> Option<(String, String)> {
    let (key, value) = unquote(raw).split_once('=')?;
    let key = unquote(key);
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote(value).to_string()))
}
