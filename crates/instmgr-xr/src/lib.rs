//! Install operation units and package identity model for XR-family
//! routers.
//!
//! [`package`] parses raw package tokens into comparable identities and
//! provides the set arithmetic the activate/deactivate/remove units decide
//! with. The units themselves drive the device through a shared install
//! dialogue and are registered with the engine's `PluginManager` via
//! [`default_plugins`] (standard per-phase units) and [`upgrade_plugins`]
//! (sequenced SU/ISSU units, dispatched by explicit name filter).

mod activate;
mod add;
mod commit;
mod deactivate;
mod install;
mod issu;
pub mod package;
mod pre;
mod remove;
mod su;

use std::sync::Arc;

use instmgr_core::{InstallPlugin, Platform};

pub use activate::ActivatePlugin;
pub use add::AddPlugin;
pub use commit::CommitPlugin;
pub use deactivate::DeactivatePlugin;
pub use issu::IssuPlugin;
pub use pre::{PreActivatePlugin, PreAddPlugin, PreDeactivatePlugin};
pub use remove::RemovePlugin;
pub use su::SoftwareUpgradePlugin;

/// Platform families the XR units support.
pub(crate) const XR_PLATFORMS: &[Platform] = &[
    Platform::Asr9k,
    Platform::Ncs1k,
    Platform::Ncs5k,
    Platform::Ncs5500,
    Platform::Ncs6k,
];

/// The standard per-phase units, in registration (execution) order.
pub fn default_plugins() -> Vec<Arc<dyn InstallPlugin>> {
    vec![
        Arc::new(PreAddPlugin),
        Arc::new(PreActivatePlugin),
        Arc::new(PreDeactivatePlugin),
        Arc::new(AddPlugin),
        Arc::new(ActivatePlugin),
        Arc::new(DeactivatePlugin),
        Arc::new(RemovePlugin),
        Arc::new(CommitPlugin),
    ]
}

/// The sequenced upgrade units. These also run in the Add phase and are
/// meant to be selected by an explicit name filter.
pub fn upgrade_plugins() -> Vec<Arc<dyn InstallPlugin>> {
    vec![Arc::new(SoftwareUpgradePlugin), Arc::new(IssuPlugin)]
}
