//! Rendering of intermediate results into an output format
//!
//! Aggregation produces decisions, scores, text, structured model answers or
//! a selected upstream value. Each is mapped into the adaptor's declared
//! format by a named rule, reported alongside the value for the trace.

use serde_json::Value;

use super::{convert, ConversionError, FormattedValue, OutputFormat, ScoreBands};

/// Result of aggregation before it is shaped for output
#[derive(Debug, Clone, PartialEq)]
pub enum Intermediate {
    /// Boolean decision (voting, thresholding, logical methods)
    Decision(bool),
    /// Numeric score (weighted average, fallback average)
    Score(f64),
    /// Free text (concatenation)
    Text(String),
    /// Authoritative core-model answer (llm reasoning)
    Structured(Value),
    /// One upstream value, unmodified (selection methods, conflict picks)
    Selected(FormattedValue),
}

impl Intermediate {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decision(_) => "decision",
            Self::Score(_) => "score",
            Self::Text(_) => "text",
            Self::Structured(_) => "structured",
            Self::Selected(_) => "selected",
        }
    }
}

/// A rendered value plus the rule that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub value: FormattedValue,
    pub rule: &'static str,
}

/// Shape `intermediate` into `target`
///
/// `rationale` becomes the text half of `StringAnd*` outputs unless score
/// bands label the score.
pub fn render(
    intermediate: Intermediate,
    rationale: &str,
    target: OutputFormat,
    bands: Option<&ScoreBands>,
) -> Result<Rendered, ConversionError> {
    let unsupported = |kind: &str| ConversionError::Unsupported {
        from: kind.to_string(),
        to: target,
    };

    match intermediate {
        Intermediate::Decision(decision) => match target {
            OutputFormat::Bool => Ok(rendered(FormattedValue::Bool(decision), "emit_decision")),
            OutputFormat::StringAndBool => Ok(rendered(
                FormattedValue::StringAndBool(rationale.to_string(), decision),
                "explain_decision",
            )),
            _ => Err(unsupported("decision")),
        },
        Intermediate::Score(score) => {
            let rounded = round_to_uint(score)?;
            match target {
                OutputFormat::Uint256 => Ok(rendered(FormattedValue::Uint256(rounded), "round_to_uint")),
                OutputFormat::StringAndUint256 => {
                    let text = match bands {
                        Some(bands) => bands.label(rounded).to_string(),
                        None => rationale.to_string(),
                    };
                    Ok(rendered(
                        FormattedValue::StringAndUint256(text, rounded),
                        "label_score",
                    ))
                }
                _ => Err(unsupported("score")),
            }
        }
        Intermediate::Text(text) => match target {
            OutputFormat::Bytes => Ok(rendered(FormattedValue::Bytes(text.into_bytes()), "encode_text")),
            _ => Err(unsupported("text")),
        },
        Intermediate::Structured(value) => {
            decode_structured(&value, rationale, target).map(|v| rendered(v, "decode_structured"))
        }
        Intermediate::Selected(value) => {
            let from = value.format();
            let (value, rule) = convert(value, from, target, bands)?;
            Ok(rendered(value, rule))
        }
    }
}

fn rendered(value: FormattedValue, rule: &'static str) -> Rendered {
    Rendered { value, rule }
}

/// Round half away from zero, rejecting negative and non-finite scores
fn round_to_uint(score: f64) -> Result<u128, ConversionError> {
    if !score.is_finite() {
        return Err(ConversionError::OutOfRange {
            rule: "round_to_uint",
            reason: format!("score {} is not finite", score),
        });
    }
    let rounded = score.round();
    if rounded < 0.0 {
        return Err(ConversionError::OutOfRange {
            rule: "round_to_uint",
            reason: format!("score {} is negative", score),
        });
    }
    Ok(rounded as u128)
}

/// Decode a model answer; a bare decision/score picks up the rationale as text
fn decode_structured(
    value: &Value,
    rationale: &str,
    target: OutputFormat,
) -> Result<FormattedValue, ConversionError> {
    let is_pair = matches!(value, Value::Object(_) | Value::Array(_));
    match target {
        OutputFormat::StringAndBool if !is_pair => {
            let decision = FormattedValue::from_json(value, OutputFormat::Bool)?;
            Ok(FormattedValue::StringAndBool(
                rationale.to_string(),
                decision.as_bool().unwrap_or_default(),
            ))
        }
        OutputFormat::StringAndUint256 if !is_pair => {
            let score = FormattedValue::from_json(value, OutputFormat::Uint256)?;
            Ok(FormattedValue::StringAndUint256(
                rationale.to_string(),
                score.as_score().unwrap_or_default(),
            ))
        }
        _ => FormattedValue::from_json(value, target),
    }
}
