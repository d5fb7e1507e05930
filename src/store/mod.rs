//! Store Module - per-invocation result storage
//!
//! - `ExecutionResult`: node id -> `NodeResult`, write-once, owned by one runner

mod execution;

pub use execution::{ExecutionResult, NodeResult, NodeStatus};
