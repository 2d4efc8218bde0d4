//! Install-operation orchestration engine.
//!
//! This crate sequences device install workflows:
//!
//! - [`Phase`]: the fixed ordered phase list (Pre-Upgrade … Commit) with
//!   auto-injected pre-phases for Add/Activate/Deactivate
//! - [`InstallPlugin`]: the operation-unit contract: declared platforms,
//!   declared phases and an entry point
//! - [`PluginManager`]: an explicit static registry plus the phase
//!   dispatcher (platform/phase/name filtering, serial execution,
//!   fail-fast pre-phase gating)
//! - [`InstallContext`]: the per-job context owning the session line, the
//!   job parameters and the explicit outcome struct
//!
//! Device-facing primitives (session, dialogue executor, watcher) live in
//! `instmgr-common`; platform-specific operation units live in their own
//! crates and are registered here by the hosting application.

mod context;
mod manager;
mod phase;
mod platform;
mod plugin;
mod task;

pub use context::{InstallContext, InstallJob, JobOutcome, StatusLine};
pub use manager::{PluginManager, PluginResult};
pub use phase::{Phase, PhaseParseError, INSTALL_PHASES};
pub use platform::{Platform, PlatformParseError};
pub use plugin::InstallPlugin;
pub use task::{TaskError, TaskResult, TaskStatus};
