//! Per-project batcher registry and crash recovery.
//!
//! The registry is the single coordination point between callers that need a
//! project's batcher and the workers themselves. It owns the directory of
//! live workers, arbitrates the startup race between `get` and a worker's
//! self-registration, and reacts to abnormal terminations.
//!
//! # Architecture
//!
//! ```text
//!  callers ──get──►┌──────────────┐      ┌────────────────────┐
//!                  │   Registry   │─────►│   registry actor   │
//!  workers ─monitor►│ (client side)│ mpsc │ by_project/by_token│
//!                  └──────────────┘      └─────────┬──────────┘
//!                                                  │ worker exited
//!                                        ┌─────────▼──────────┐
//!                                        │   crash recovery   │──► Storage
//!                                        │  (report + cleanup)│··► Notifier
//!                                        └────────────────────┘
//! ```
//!
//! All directory mutation happens inside one actor task that drains a message
//! channel in arrival order; `get`'s retry sleeps and worker spawning happen
//! in the calling context so the directory stays responsive.
//!
//! # Module Structure
//!
//! - `registry`: the [`Registry`] client handle and the actor
//! - `recovery`: the pipeline run after an abnormal termination
//! - `report`: [`CrashReportBuilder`] and the section text format

mod message;
mod recovery;
mod registry;
mod report;

pub use recovery::CRASH_COMPONENT;
pub use registry::{Registry, RegistryError, Result};
pub use report::{CRASH_ALARM, CrashReport, CrashReportBuilder};
