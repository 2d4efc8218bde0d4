//! Install Commit: make the active software set permanent across reloads.

use async_trait::async_trait;
use tracing::info;

use instmgr_common::ReconnectWindow;
use instmgr_core::{InstallContext, InstallPlugin, Phase, Platform, TaskResult};

use crate::install::{execute_install, refresh_package_snapshot};
use crate::XR_PLATFORMS;

/// Commits the active package set.
pub struct CommitPlugin;

#[async_trait]
impl InstallPlugin for CommitPlugin {
    fn name(&self) -> &'static str {
        "install-commit"
    }

    fn platforms(&self) -> &'static [Platform] {
        XR_PLATFORMS
    }

    fn phases(&self) -> &'static [Phase] {
        &[Phase::Commit]
    }

    async fn run(&self, ctx: &mut InstallContext) -> TaskResult<()> {
        let window = ReconnectWindow::default();
        ctx.post_status("Commit Package(s) Pending");
        execute_install(ctx, "install commit", "install commit", &window).await?;

        refresh_package_snapshot(ctx).await?;
        info!("package(s) committed successfully");
        ctx.post_status("Package(s) Committed Successfully");
        Ok(())
    }
}
