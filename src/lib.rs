//! Merge Queue - process registry and crash recovery for per-project batchers.
//!
//! Every project managed by the orchestrator gets exactly one long-lived
//! "batcher" worker that runs its queue of pull-request batches through CI and
//! merge. This crate owns the directory mapping projects to live workers, the
//! protocol workers use to announce themselves, and the recovery pipeline that
//! cleans up batch state and raises an alarm when a worker dies abnormally.

pub mod config;
pub mod notify;
pub mod registry;
pub mod storage;
pub mod supervisor;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;
