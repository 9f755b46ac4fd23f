//! Core domain types for the merge queue registry.
//!
//! This module contains the fundamental types used throughout the crate,
//! designed to encode invariants via the type system.

pub mod batch;
pub mod ids;
pub mod project;

// Re-export commonly used types at the module level
pub use batch::{Batch, BatchState};
pub use ids::{BatchId, MonitorToken, PrNumber, ProjectId, WorkerId};
pub use project::{CrashRecord, ProjectRecord};
