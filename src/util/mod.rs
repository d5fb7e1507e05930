//! Utilities: constants and node id validation

mod constants;
mod id;

pub use constants::*;
pub use id::validate_node_id;
