// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoded metric records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A value carried by a metric field.
///
/// Wavefront only transports numbers, but boolean literals are accepted
/// as well so they are kept as their own variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// 64-bit floating point.
    Float(f64),
    /// Boolean value.
    Boolean(bool),
}

impl FieldValue {
    /// Returns the float value, if this is a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Boolean(_) => None,
        }
    }

    /// Returns the boolean value, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(v) => Some(*v),
            FieldValue::Float(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Boolean(v) => write!(f, "{}", v),
        }
    }
}

/// One decoded line of wavefront input.
///
/// `name` is the first segment of the dotted metric path and the single
/// field key is the rest of the path. A missing timestamp means the
/// collector should stamp the record with its own receipt time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Measurement name.
    pub name: String,

    /// Field key to value. Holds exactly one entry when produced by the decoder.
    pub fields: HashMap<String, FieldValue>,

    /// Tag key to tag value.
    #[serde(default)]
    pub tags: HashMap<String, String>,

    /// Source timestamp (second precision), if the line carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Metric {
    /// Create a record holding a single field.
    pub fn new(name: impl Into<String>, field: impl Into<String>, value: FieldValue) -> Self {
        let mut fields = HashMap::with_capacity(1);
        fields.insert(field.into(), value);
        Self {
            name: name.into(),
            fields,
            tags: HashMap::new(),
            timestamp: None,
        }
    }

    /// Add a tag (builder style).
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set the source timestamp (builder style).
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Look up a field value.
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        self.fields.get(key).copied()
    }
}
