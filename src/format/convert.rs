//! Conversion table between output formats
//!
//! Every supported pair is a named rule in `CONVERSION_TABLE`. Pairs missing
//! from the table fail with `ConversionError::Unsupported`; nothing is coerced
//! implicitly. `Bool -> Uint256` is deliberately absent.

use super::{ConversionError, FormattedValue, OutputFormat, ScoreBands};
use crate::util::WORD_LEN;

type ApplyFn = fn(FormattedValue, Option<&ScoreBands>) -> Result<FormattedValue, ConversionError>;

/// A named conversion between two formats
pub struct ConversionRule {
    pub name: &'static str,
    pub from: OutputFormat,
    pub to: OutputFormat,
    apply: ApplyFn,
}

impl ConversionRule {
    /// Whether the rule needs score bands to run
    pub fn needs_bands(&self) -> bool {
        self.name == "label_score"
    }
}

impl std::fmt::Debug for ConversionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({} -> {})", self.name, self.from, self.to)
    }
}

const fn identity(format: OutputFormat) -> ConversionRule {
    ConversionRule {
        name: "identity",
        from: format,
        to: format,
        apply: keep,
    }
}

fn keep(value: FormattedValue, _: Option<&ScoreBands>) -> Result<FormattedValue, ConversionError> {
    Ok(value)
}

/// One identity rule per format, in `OutputFormat::ALL` order
static IDENTITIES: [ConversionRule; 6] = [
    identity(OutputFormat::Bool),
    identity(OutputFormat::Uint256),
    identity(OutputFormat::Bytes32),
    identity(OutputFormat::Bytes),
    identity(OutputFormat::StringAndBool),
    identity(OutputFormat::StringAndUint256),
];

/// All non-identity conversions the engine performs
pub static CONVERSION_TABLE: &[ConversionRule] = &[
    ConversionRule {
        name: "drop_text",
        from: OutputFormat::StringAndBool,
        to: OutputFormat::Bool,
        apply: drop_text,
    },
    ConversionRule {
        name: "drop_text",
        from: OutputFormat::StringAndUint256,
        to: OutputFormat::Uint256,
        apply: drop_text,
    },
    ConversionRule {
        name: "label_score",
        from: OutputFormat::Uint256,
        to: OutputFormat::StringAndUint256,
        apply: label_score,
    },
    ConversionRule {
        name: "describe_decision",
        from: OutputFormat::Bool,
        to: OutputFormat::StringAndBool,
        apply: describe_decision,
    },
    ConversionRule {
        name: "widen_word",
        from: OutputFormat::Bytes32,
        to: OutputFormat::Bytes,
        apply: widen_word,
    },
    ConversionRule {
        name: "narrow_word",
        from: OutputFormat::Bytes,
        to: OutputFormat::Bytes32,
        apply: narrow_word,
    },
    ConversionRule {
        name: "encode_word",
        from: OutputFormat::Uint256,
        to: OutputFormat::Bytes32,
        apply: encode_word,
    },
];

/// Look up the rule for a pair (identity when `from == to`)
pub fn rule_for(from: OutputFormat, to: OutputFormat) -> Option<&'static ConversionRule> {
    if from == to {
        return IDENTITIES.iter().find(|rule| rule.from == from);
    }
    CONVERSION_TABLE
        .iter()
        .find(|rule| rule.from == from && rule.to == to)
}

/// Convert `value` (declared as `from`) into `to`
///
/// Returns the converted value and the name of the rule that produced it.
pub fn convert(
    value: FormattedValue,
    from: OutputFormat,
    to: OutputFormat,
    bands: Option<&ScoreBands>,
) -> Result<(FormattedValue, &'static str), ConversionError> {
    if value.format() != from {
        return Err(ConversionError::FormatMismatch {
            expected: from,
            actual: value.format(),
        });
    }
    let rule = rule_for(from, to).ok_or_else(|| ConversionError::Unsupported {
        from: from.to_string(),
        to,
    })?;
    let converted = (rule.apply)(value, bands)?;
    Ok((converted, rule.name))
}

fn drop_text(value: FormattedValue, _: Option<&ScoreBands>) -> Result<FormattedValue, ConversionError> {
    match value {
        FormattedValue::StringAndBool(_, b) => Ok(FormattedValue::Bool(b)),
        FormattedValue::StringAndUint256(_, n) => Ok(FormattedValue::Uint256(n)),
        other => Err(mismatch(OutputFormat::StringAndBool, &other)),
    }
}

fn label_score(value: FormattedValue, bands: Option<&ScoreBands>) -> Result<FormattedValue, ConversionError> {
    let bands = bands.ok_or(ConversionError::MissingScoreBands { rule: "label_score" })?;
    match value {
        FormattedValue::Uint256(n) => Ok(FormattedValue::StringAndUint256(bands.label(n).to_string(), n)),
        other => Err(mismatch(OutputFormat::Uint256, &other)),
    }
}

fn describe_decision(value: FormattedValue, _: Option<&ScoreBands>) -> Result<FormattedValue, ConversionError> {
    match value {
        FormattedValue::Bool(b) => Ok(FormattedValue::StringAndBool(b.to_string(), b)),
        other => Err(mismatch(OutputFormat::Bool, &other)),
    }
}

fn widen_word(value: FormattedValue, _: Option<&ScoreBands>) -> Result<FormattedValue, ConversionError> {
    match value {
        FormattedValue::Bytes32(w) => Ok(FormattedValue::Bytes(w.to_vec())),
        other => Err(mismatch(OutputFormat::Bytes32, &other)),
    }
}

fn narrow_word(value: FormattedValue, _: Option<&ScoreBands>) -> Result<FormattedValue, ConversionError> {
    match value {
        FormattedValue::Bytes(bytes) => {
            let len = bytes.len();
            let word: [u8; WORD_LEN] =
                bytes
                    .try_into()
                    .map_err(|_| ConversionError::OutOfRange {
                        rule: "narrow_word",
                        reason: format!("expected exactly {} bytes, got {}", WORD_LEN, len),
                    })?;
            Ok(FormattedValue::Bytes32(word))
        }
        other => Err(mismatch(OutputFormat::Bytes, &other)),
    }
}

fn encode_word(value: FormattedValue, _: Option<&ScoreBands>) -> Result<FormattedValue, ConversionError> {
    match value {
        FormattedValue::Uint256(n) => {
            let mut word = [0u8; WORD_LEN];
            word[WORD_LEN - 16..].copy_from_slice(&n.to_be_bytes());
            Ok(FormattedValue::Bytes32(word))
        }
        other => Err(mismatch(OutputFormat::Uint256, &other)),
    }
}

fn mismatch(expected: OutputFormat, actual: &FormattedValue) -> ConversionError {
    ConversionError::FormatMismatch {
        expected,
        actual: actual.format(),
    }
}
