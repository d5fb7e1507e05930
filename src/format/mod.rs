//! Output formats - the fixed, settlement-consumable value shapes
//!
//! Contains:
//! - `OutputFormat`: the closed set of shapes a node may declare
//! - `FormattedValue`: a value carried in one of those shapes
//! - `convert`: the named, table-driven conversion between shapes
//! - `render`: mapping of intermediate aggregation results into a shape
//!
//! `Uint256` values are carried as `u128`. Scores, counts and labels produced
//! by the engine never approach that bound; `encode_word` still emits a full
//! 32-byte big-endian word.

mod convert;
mod render;

pub use convert::{convert, rule_for, ConversionRule, CONVERSION_TABLE};
pub use render::{render, Intermediate, Rendered};

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use thiserror::Error;

use crate::util::WORD_LEN;

/// Shape of a node's output, fixed at declaration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    Bool,
    Uint256,
    Bytes32,
    Bytes,
    StringAndBool,
    StringAndUint256,
}

impl OutputFormat {
    /// Every format, in declaration order
    pub const ALL: [OutputFormat; 6] = [
        OutputFormat::Bool,
        OutputFormat::Uint256,
        OutputFormat::Bytes32,
        OutputFormat::Bytes,
        OutputFormat::StringAndBool,
        OutputFormat::StringAndUint256,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Uint256 => "Uint256",
            Self::Bytes32 => "Bytes32",
            Self::Bytes => "Bytes",
            Self::StringAndBool => "StringAndBool",
            Self::StringAndUint256 => "StringAndUint256",
        }
    }

    /// Carries a decision (`Bool`, `StringAndBool`)
    pub fn is_boolean(&self) -> bool {
        matches!(self, Self::Bool | Self::StringAndBool)
    }

    /// Carries a score (`Uint256`, `StringAndUint256`)
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Uint256 | Self::StringAndUint256)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score thresholds used to label a `Uint256` score
///
/// `score <= low` is LOW, `score <= medium` is MEDIUM, anything above is HIGH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBands {
    pub low: u64,
    pub medium: u64,
}

impl ScoreBands {
    pub fn new(low: u64, medium: u64) -> Self {
        Self { low, medium }
    }

    pub fn label(&self, score: u128) -> &'static str {
        if score <= u128::from(self.low) {
            "LOW"
        } else if score <= u128::from(self.medium) {
            "MEDIUM"
        } else {
            "HIGH"
        }
    }
}

/// Errors raised by the pure conversion layer
///
/// Carries no node context; the runtime wraps it in `AdcsError::Conversion`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("unsupported conversion {from} -> {to}")]
    Unsupported { from: String, to: OutputFormat },

    #[error("value is {actual}, not the declared {expected}")]
    FormatMismatch {
        expected: OutputFormat,
        actual: OutputFormat,
    },

    #[error("rule '{rule}' rejected value: {reason}")]
    OutOfRange { rule: &'static str, reason: String },

    #[error("rule '{rule}' needs score bands but none are configured")]
    MissingScoreBands { rule: &'static str },

    #[error("cannot decode {format}: {reason}")]
    Decode { format: OutputFormat, reason: String },
}

/// A value in one of the fixed output shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormattedValue {
    Bool(bool),
    Uint256(u128),
    Bytes32([u8; WORD_LEN]),
    Bytes(Vec<u8>),
    StringAndBool(String, bool),
    StringAndUint256(String, u128),
}

impl FormattedValue {
    pub fn format(&self) -> OutputFormat {
        match self {
            Self::Bool(_) => OutputFormat::Bool,
            Self::Uint256(_) => OutputFormat::Uint256,
            Self::Bytes32(_) => OutputFormat::Bytes32,
            Self::Bytes(_) => OutputFormat::Bytes,
            Self::StringAndBool(..) => OutputFormat::StringAndBool,
            Self::StringAndUint256(..) => OutputFormat::StringAndUint256,
        }
    }

    /// Decision carried by a boolean-shaped value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) | Self::StringAndBool(_, b) => Some(*b),
            _ => None,
        }
    }

    /// Score carried by a numeric-shaped value
    pub fn as_score(&self) -> Option<u128> {
        match self {
            Self::Uint256(n) | Self::StringAndUint256(_, n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view used by averaging and thresholding (decisions count as 1/0)
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Uint256(n) | Self::StringAndUint256(_, n) => Some(*n as f64),
            Self::Bool(b) | Self::StringAndBool(_, b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Text half of a `StringAnd*` value
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::StringAndBool(t, _) | Self::StringAndUint256(t, _) => Some(t),
            _ => None,
        }
    }

    /// Textual rendering used by `concatenation` and rationales
    pub fn to_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Uint256(n) => n.to_string(),
            Self::Bytes32(w) => format!("0x{}", hex::encode(w)),
            Self::Bytes(b) => format!("0x{}", hex::encode(b)),
            Self::StringAndBool(t, _) | Self::StringAndUint256(t, _) => t.clone(),
        }
    }

    /// Decode a JSON value into the given format
    ///
    /// Accepted shapes:
    /// - `Bool`: JSON bool, or the strings "true"/"false" (any case)
    /// - `Uint256`: non-negative integer, or a decimal string
    /// - `Bytes32`: 0x-prefixed hex string of exactly 32 bytes
    /// - `Bytes`: 0x-prefixed hex string, or any other string as UTF-8
    /// - `StringAnd*`: `{"text": .., "value": ..}` or `[text, value]`
    pub fn from_json(value: &Value, format: OutputFormat) -> Result<Self, ConversionError> {
        let decode_err = |reason: String| ConversionError::Decode { format, reason };

        match format {
            OutputFormat::Bool => decode_bool(value).map(Self::Bool).map_err(decode_err),
            OutputFormat::Uint256 => decode_uint(value).map(Self::Uint256).map_err(decode_err),
            OutputFormat::Bytes32 => {
                let bytes = match value {
                    Value::String(s) if s.starts_with("0x") => {
                        hex::decode(&s[2..]).map_err(|e| decode_err(e.to_string()))?
                    }
                    other => return Err(decode_err(format!("expected 0x-hex string, got {}", other))),
                };
                let word: [u8; WORD_LEN] = bytes.as_slice().try_into().map_err(|_| {
                    decode_err(format!("expected {} bytes, got {}", WORD_LEN, bytes.len()))
                })?;
                Ok(Self::Bytes32(word))
            }
            OutputFormat::Bytes => match value {
                Value::String(s) if s.starts_with("0x") => hex::decode(&s[2..])
                    .map(Self::Bytes)
                    .map_err(|e| decode_err(e.to_string())),
                Value::String(s) => Ok(Self::Bytes(s.as_bytes().to_vec())),
                other => Err(decode_err(format!("expected string, got {}", other))),
            },
            OutputFormat::StringAndBool => {
                let (text, flag) = split_pair(value).map_err(decode_err)?;
                let flag = decode_bool(flag).map_err(decode_err)?;
                Ok(Self::StringAndBool(text, flag))
            }
            OutputFormat::StringAndUint256 => {
                let (text, score) = split_pair(value).map_err(decode_err)?;
                let score = decode_uint(score).map_err(decode_err)?;
                Ok(Self::StringAndUint256(text, score))
            }
        }
    }

    /// JSON encoding, the inverse of `from_json`
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Uint256(n) => uint_to_json(*n),
            Self::Bytes32(w) => Value::String(format!("0x{}", hex::encode(w))),
            Self::Bytes(b) => Value::String(format!("0x{}", hex::encode(b))),
            Self::StringAndBool(t, b) => json!({ "text": t, "value": b }),
            Self::StringAndUint256(t, n) => json!({ "text": t, "value": uint_to_json(*n) }),
        }
    }
}

impl fmt::Display for FormattedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StringAndBool(t, b) => write!(f, "({:?}, {})", t, b),
            Self::StringAndUint256(t, n) => write!(f, "({:?}, {})", t, n),
            other => f.write_str(&other.to_text()),
        }
    }
}

impl Serialize for FormattedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn uint_to_json(n: u128) -> Value {
    match u64::try_from(n) {
        Ok(small) => Value::from(small),
        Err(_) => Value::String(n.to_string()),
    }
}

fn decode_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(format!("expected boolean, got {}", other)),
    }
}

fn decode_uint(value: &Value) -> Result<u128, String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| format!("expected non-negative integer, got {}", n)),
        Value::String(s) => s
            .trim()
            .parse::<u128>()
            .map_err(|e| format!("invalid decimal '{}': {}", s, e)),
        other => Err(format!("expected integer, got {}", other)),
    }
}

fn split_pair(value: &Value) -> Result<(String, &Value), String> {
    let (text, inner) = match value {
        Value::Object(map) => (map.get("text"), map.get("value")),
        Value::Array(items) if items.len() == 2 => (items.first(), items.get(1)),
        other => return Err(format!("expected {{text, value}} or [text, value], got {}", other)),
    };
    let text = match text {
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(format!("text must be a string, got {}", other)),
        None => return Err("missing 'text'".to_string()),
    };
    let inner = inner.ok_or_else(|| "missing 'value'".to_string())?;
    Ok((text, inner))
}
