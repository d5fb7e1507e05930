//! ADCS - adaptor graph execution engine
//!
//! Runs declared graphs of Providers (external inference calls) and Adaptors
//! (aggregation, conflict resolution, format conversion) and hands the
//! terminal value to settlement.
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DOMAIN MODEL                          │
//! │  node/      Node kinds, adaptor config, node outputs         │
//! │  format/    Output formats, conversion table, rendering      │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APPLICATION LAYER                       │
//! │  dag/        Graph model, validation, execution planner      │
//! │  aggregate/  Aggregation methods, conflict resolver          │
//! │  runtime/    Engine, Runner, adaptor + chain execution       │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  provider/    Backend traits, invoker, registry, mocks       │
//! │  store/       Per-invocation ExecutionResult                 │
//! │  event/       Event sourcing, per-node trace                 │
//! │  settlement   Delivery sink                                  │
//! │  util/        Constants, node id validation                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`node`] | `Node`, `NodeKind`, `Transform`, `AdaptorConfig`, `NodeOutput` |
//! | [`format`] | `OutputFormat`, `FormattedValue`, named conversions |
//! | [`dag`] | `AdaptorGraph` arena, DFS cycle detection, Kahn planning |
//! | [`aggregate`] | Voting, averaging, selection, logical methods, conflicts |
//! | [`runtime`] | `Engine`, `Runner`, chain state machine |
//! | [`provider`] | `InferenceBackend`, `CoreModel`, `Backends` |
//! | [`store`] | Write-once `ExecutionResult` |
//! | [`event`] | `EventLog`, `EventEmitter`, `TraceRecord` |
//! | [`settlement`] | `SettlementSink`, `Delivery` |
//! | [`config`] | `EngineConfig` (TOML + env) |
//! | [`error`] | `AdcsError` with stable codes |

// ═══════════════════════════════════════════════════════════════
// DOMAIN MODEL
// ═══════════════════════════════════════════════════════════════
pub mod format;
pub mod node;

// ═══════════════════════════════════════════════════════════════
// APPLICATION LAYER - Validation, aggregation, execution
// ═══════════════════════════════════════════════════════════════
pub mod aggregate;
pub mod dag;
pub mod runtime;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE LAYER - Backends, storage, events, settlement
// ═══════════════════════════════════════════════════════════════
pub mod event;
pub mod provider;
pub mod settlement;
pub mod store;
pub mod util;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - Error handling, configuration
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

// Error types
pub use error::{AdcsError, ErrorKind, Result};

// Config types
pub use config::EngineConfig;

// Domain types
pub use format::{ConversionError, FormattedValue, OutputFormat, ScoreBands};
pub use node::{
    AdaptorConfig, AggregationMethod, ChainLink, ConflictConfig, ConflictPolicy, Node, NodeKind, NodeOutput,
    NormalizationMethod, Transform,
};

// Graph types
pub use dag::{AdaptorGraph, ValidatedGraph};

// Runtime types
pub use runtime::{ChainState, Engine, InvocationReport, InvocationRequest, Runner};

// Backend types
pub use provider::{Backends, CoreModel, InferenceBackend, ModelResponse, ProviderOutput};

// Observability and settlement
pub use event::{EventEmitter, EventKind, EventLog, TraceRecord};
pub use settlement::{CollectingSink, Delivery, SettlementSink};

// Cancellation token accepted by `Engine::execute`
pub use tokio_util::sync::CancellationToken;
