//! Typed ClassAd attribute values and their text/JSON projections.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Number of decimals used when a real is rendered as human-readable text.
///
/// Fixed-point rendering is lossy: `3.14159265` renders as `3.141593`. Use
/// [`Attribute::to_long_value`] or the JSON projection when the exact value
/// must survive.
pub const REAL_PRECISION: usize = 6;

/// Key of the JSON object used for reals JSON numbers cannot hold.
///
/// `NaN` and the infinities serialize as `{"real": "NaN"}`, `{"real": "inf"}`
/// and `{"real": "-inf"}`. A plain JSON `null` is reserved for
/// [`Attribute::Undefined`], and a plain string would be indistinguishable
/// from a string attribute spelled the same way.
pub const NON_FINITE_REAL_KEY: &str = "real";

/// Literal rendered for [`Attribute::Undefined`].
pub const UNDEFINED_LITERAL: &str = "UNDEFINED";

/// Literal rendered for [`Attribute::Error`].
pub const ERROR_LITERAL: &str = "ERROR";

/// Discriminant of an [`Attribute`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// 64-bit signed integer.
    Integer,
    /// IEEE-754 double.
    Real,
    /// String literal or unevaluated expression.
    String,
    /// The ClassAd `UNDEFINED` value.
    Undefined,
    /// The ClassAd `ERROR` value; also produced for empty tokens.
    Error,
}

/// A typed ClassAd attribute value.
///
/// Expressions are never evaluated: anything that is not a quoted literal or a
/// number is kept as a [`Attribute::String`] holding the raw expression text.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// Integer value.
    Integer(i64),
    /// Real value.
    Real(f64),
    /// String value (quotes removed) or raw expression text.
    String(String),
    /// Undefined value.
    Undefined,
    /// Error value.
    Error,
}

impl Attribute {
    /// Parse a single value token as printed by the HTCondor tools.
    ///
    /// ```
    /// use htcondor_query::classad::Attribute;
    ///
    /// assert_eq!(Attribute::parse("42"), Attribute::Integer(42));
    /// assert_eq!(Attribute::parse("3.14"), Attribute::Real(3.14));
    /// assert_eq!(Attribute::parse("\"foo\""), Attribute::String("foo".into()));
    /// assert_eq!(Attribute::parse(""), Attribute::Error);
    /// ```
    #[must_use]
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if token.is_empty() {
            return Self::Error;
        }
        if !token.starts_with('"') {
            if let Ok(value) = token.parse::<i64>() {
                return Self::Integer(value);
            }
            if let Ok(value) = token.parse::<f64>() {
                return Self::Real(value);
            }
        }
        let inner = token.strip_prefix('"').unwrap_or(token);
        let inner = inner.strip_suffix('"').unwrap_or(inner);
        Self::String(inner.to_string())
    }

    /// Kind of this attribute.
    #[must_use]
    pub const fn kind(&self) -> AttributeKind {
        match self {
            Self::Integer(_) => AttributeKind::Integer,
            Self::Real(_) => AttributeKind::Real,
            Self::String(_) => AttributeKind::String,
            Self::Undefined => AttributeKind::Undefined,
            Self::Error => AttributeKind::Error,
        }
    }

    /// Integer payload, if this is an integer.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric payload widened to `f64`, for integers and reals.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Render as text, using `precision` decimals for reals.
    #[must_use]
    pub fn to_text_with_precision(&self, precision: usize) -> String {
        match self {
            Self::Integer(v) => v.to_string(),
            Self::Real(v) => format!("{v:.precision$}"),
            Self::String(s) => s.clone(),
            Self::Undefined => UNDEFINED_LITERAL.to_string(),
            Self::Error => ERROR_LITERAL.to_string(),
        }
    }

    /// Render as a long-format value that [`Attribute::parse`] reads back
    /// into the same integer, real, string or error value.
    #[must_use]
    pub fn to_long_value(&self) -> String {
        match self {
            Self::Integer(v) => v.to_string(),
            Self::Real(v) => format!("{v:?}"),
            Self::String(s) => format!("\"{s}\""),
            Self::Undefined => UNDEFINED_LITERAL.to_string(),
            Self::Error => String::new(),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text_with_precision(REAL_PRECISION))
    }
}

impl FromStr for Attribute {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<i64> for Attribute {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Attribute {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Attribute {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

fn non_finite_literal(value: f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if value.is_sign_negative() {
        "-inf"
    } else {
        "inf"
    }
}

/// JSON projection: numbers and strings map to the matching JSON scalar,
/// `Undefined` maps to `null` and `Error` to `{"error": true}` so neither can
/// be mistaken for a real value. Non-finite reals use the object form
/// described at [`NON_FINITE_REAL_KEY`].
impl Serialize for Attribute {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Real(v) if v.is_finite() => serializer.serialize_f64(*v),
            Self::Real(v) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(NON_FINITE_REAL_KEY, non_finite_literal(*v))?;
                map.end()
            }
            Self::String(s) => serializer.serialize_str(s),
            Self::Undefined => serializer.serialize_none(),
            Self::Error => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", &true)?;
                map.end()
            }
        }
    }
}
