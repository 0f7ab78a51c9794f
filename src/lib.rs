//! Workspace placeholder crate.
//!
//! Re-exports the sync engine façade and exposes the `desktop-shims` feature,
//! which wires desktop defaults (such as the lifecycle observer) into
//! `core-runtime`. Hosts can depend on `playstate-workspace` instead of wiring
//! each crate individually.

pub use core_runtime::config::{CoreConfig, CoreConfigBuilder, FeatureFlags};
pub use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
pub use core_sync::{AttributeCategory, Result, SyncConfig, SyncError, SyncService};
