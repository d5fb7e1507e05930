//! Node id validation
//!
//! Ids are referenced by edges, weights and priority lists, so they are kept
//! to a conservative character set: a leading letter, then `[A-Za-z0-9_.-]`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::constants::MAX_NODE_ID_LEN;
use crate::error::AdcsError;

static NODE_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.\-]*$").expect("node id pattern is valid"));

/// Validate a node id (ADCS-016 on failure)
pub fn validate_node_id(id: &str) -> Result<(), AdcsError> {
    if id.is_empty() {
        return Err(AdcsError::InvalidNodeId {
            id: id.to_string(),
            reason: "id is empty".to_string(),
        });
    }
    if id.len() > MAX_NODE_ID_LEN {
        return Err(AdcsError::InvalidNodeId {
            id: id.to_string(),
            reason: format!("id is longer than {} characters", MAX_NODE_ID_LEN),
        });
    }
    if !NODE_ID_PATTERN.is_match(id) {
        return Err(AdcsError::InvalidNodeId {
            id: id.to_string(),
            reason: "must start with a letter and contain only [A-Za-z0-9_.-]".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_ids() {
        assert!(validate_node_id("financial").is_ok());
        assert!(validate_node_id("risk_score.v2").is_ok());
        assert!(validate_node_id("News-Sentiment").is_ok());
    }

    #[test]
    fn rejects_empty_and_leading_digit() {
        assert!(validate_node_id("").is_err());
        assert!(validate_node_id("1st").is_err());
    }

    #[test]
    fn rejects_whitespace_and_symbols() {
        let err = validate_node_id("has space").unwrap_err();
        assert_eq!(err.code(), "ADCS-016");
        assert!(validate_node_id("a/b").is_err());
    }

    #[test]
    fn rejects_overlong_ids() {
        let id = format!("a{}", "b".repeat(MAX_NODE_ID_LEN));
        assert!(validate_node_id(&id).is_err());
    }
}
