//! Common types used throughout the crate
//!
//! This module contains shared type definitions, type aliases,
//! and the numeric coercion rules applied to page/limit input.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// A document returned by the aggregation engine
pub type Document = JsonValue;

/// Sort specification, e.g. `{"createdAt": -1, "name": 1}`
pub type SortSpec = JsonValue;

/// Projection specification, e.g. `{"name": 1, "email": 1}`
pub type ProjectionSpec = JsonValue;

// ============================================================================
// Numeric Input
// ============================================================================

/// Reserved textual spelling of the unlimited sentinel
pub const UNLIMITED_KEYWORD: &str = "unlimited";

/// Reserved numeric spelling of the unlimited sentinel
pub const UNLIMITED_SENTINEL: i64 = -1;

/// A number-like input as callers tend to supply it (query strings, JSON bodies)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberLike {
    /// Integral number
    Int(i64),
    /// Fractional number, truncated toward zero when parsed
    Float(f64),
    /// Text, parsed by its leading integer
    Text(String),
}

impl NumberLike {
    /// Parse the leading integer of this input.
    ///
    /// Accepts optional leading whitespace and sign followed by digits and
    /// ignores whatever trails them, so `"3abc"` is `3` and `"abc"` is `None`.
    pub fn parse_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::Float(_) => None,
            Self::Text(s) => parse_leading_int(s),
        }
    }

    /// True if this input spells the unlimited sentinel
    pub fn is_unlimited(&self) -> bool {
        match self {
            Self::Text(s) if s.trim().eq_ignore_ascii_case(UNLIMITED_KEYWORD) => true,
            other => other.parse_int() == Some(UNLIMITED_SENTINEL),
        }
    }
}

impl From<i64> for NumberLike {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for NumberLike {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u32> for NumberLike {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for NumberLike {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for NumberLike {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for NumberLike {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Limit> for NumberLike {
    fn from(limit: Limit) -> Self {
        Self::Int(limit.as_i64())
    }
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let digits: &str = &digits[..digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len())];
    if digits.is_empty() {
        return None;
    }

    let magnitude = digits.bytes().fold(0i64, |acc, b| {
        acc.saturating_mul(10).saturating_add(i64::from(b - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}

// ============================================================================
// Page / Limit coercion
// ============================================================================

/// Coerce a page input. Unparsable or zero input falls back to page 1;
/// negative values are kept so validation can reject them.
pub fn coerce_page(input: &NumberLike) -> i64 {
    match input.parse_int() {
        None | Some(0) => 1,
        Some(page) => page,
    }
}

/// Coerce a limit input. Unlike pages there is no fallback: unparsable input
/// becomes `0` and is rejected by validation.
pub fn coerce_limit(input: &NumberLike) -> Limit {
    if input.is_unlimited() {
        return Limit::Unlimited;
    }
    Limit::Count(input.parse_int().unwrap_or(0))
}

/// Page size after coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// At most this many documents per page (validated to be `>= 1`)
    Count(i64),
    /// Return every matching document on a single page
    Unlimited,
}

impl Limit {
    /// Numeric form used in reports; the sentinel for unlimited
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Count(n) => n,
            Self::Unlimited => UNLIMITED_SENTINEL,
        }
    }

    pub fn is_unlimited(self) -> bool {
        matches!(self, Self::Unlimited)
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self::Count(12)
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Unlimited => f.write_str(UNLIMITED_KEYWORD),
        }
    }
}

impl Serialize for Limit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for Limit {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        NumberLike::deserialize(deserializer).map(|n| coerce_limit(&n))
    }
}
