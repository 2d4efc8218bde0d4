//! Install Activate: bring added packages into the running software set.

use async_trait::async_trait;
use tracing::info;

use instmgr_common::{ReconnectWindow, DEFAULT_COMMAND_TIMEOUT};
use instmgr_core::{InstallContext, InstallPlugin, Phase, Platform, TaskError, TaskResult};

use crate::install::{execute_install, refresh_package_snapshot};
use crate::package::{diff, SoftwarePackage};
use crate::XR_PLATFORMS;

/// Activates the selected packages, or the operation stored by a previous
/// add when one exists.
///
/// The currently-active set is read from the device and diffed against the
/// selection first: activating an already-active package is a no-op the
/// device would only warn about, so those are skipped up front and an
/// empty remainder short-circuits to success.
pub struct ActivatePlugin;

#[async_trait]
impl InstallPlugin for ActivatePlugin {
    fn name(&self) -> &'static str {
        "install-activate"
    }

    fn platforms(&self) -> &'static [Platform] {
        XR_PLATFORMS
    }

    fn phases(&self) -> &'static [Phase] {
        &[Phase::Activate]
    }

    async fn run(&self, ctx: &mut InstallContext) -> TaskResult<()> {
        let window = ReconnectWindow::default();

        let cmd = if let Some(op_id) = ctx.outcome.operation_id.clone() {
            format!("install activate id {op_id}")
        } else {
            if ctx.job.software_packages.is_empty() {
                return Err(TaskError::invalid_job("no package list provided"));
            }
            let active_output = ctx
                .send("show install active", DEFAULT_COMMAND_TIMEOUT)
                .await?;
            let active = SoftwarePackage::from_show_output(&active_output);
            let desired = SoftwarePackage::from_tokens(&ctx.job.software_packages);
            let pending = diff(&active, &desired).to_add;

            // Tokens the identity model cannot resolve are passed through;
            // the device is the authority on those.
            let to_activate: Vec<&str> = ctx
                .job
                .software_packages
                .iter()
                .map(String::as_str)
                .filter(|token| match SoftwarePackage::parse(token) {
                    Some(pkg) => pending.contains(&pkg),
                    None => true,
                })
                .collect();

            if to_activate.is_empty() {
                info!("all packages are already active on the device");
                ctx.post_status("Packages already active");
                return Ok(());
            }
            format!("install activate {}", to_activate.join(" "))
        };

        ctx.post_status("Activate Package(s) Pending");
        let outcome = execute_install(ctx, "install activate", &cmd, &window).await?;
        if outcome.no_impact {
            ctx.post_status("Packages already active");
            return Ok(());
        }

        refresh_package_snapshot(ctx).await?;
        info!(reloaded = outcome.reload_performed, "package(s) activated successfully");
        ctx.post_status("Package(s) Activated Successfully");
        Ok(())
    }
}
