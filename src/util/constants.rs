//! Centralized constants for engine configuration
//!
//! All timeout and limit defaults in one place for easy tuning.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
// Execution Limits
// ═══════════════════════════════════════════════════════════════

/// Default cap on concurrent external calls (provider + core model)
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 8;

/// Default per-node timeout for a single external call
pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length of a node id
pub const MAX_NODE_ID_LEN: usize = 64;

// ═══════════════════════════════════════════════════════════════
// Aggregation Defaults
// ═══════════════════════════════════════════════════════════════

/// Separator used by `concatenation` when none is configured
pub const DEFAULT_SEPARATOR: &str = ", ";

/// Width of a `Bytes32` word
pub const WORD_LEN: usize = 32;

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════
