//! Install Deactivate: take packages out of the running software set.

use async_trait::async_trait;
use tracing::info;

use instmgr_common::{ReconnectWindow, DEFAULT_COMMAND_TIMEOUT};
use instmgr_core::{InstallContext, InstallPlugin, Phase, Platform, TaskError, TaskResult};

use crate::install::{execute_install, refresh_package_snapshot};
use crate::package::{diff, SoftwarePackage};
use crate::XR_PLATFORMS;

/// Deactivates the selected packages, skipping those that are not active.
pub struct DeactivatePlugin;

#[async_trait]
impl InstallPlugin for DeactivatePlugin {
    fn name(&self) -> &'static str {
        "install-deactivate"
    }

    fn platforms(&self) -> &'static [Platform] {
        XR_PLATFORMS
    }

    fn phases(&self) -> &'static [Phase] {
        &[Phase::Deactivate]
    }

    async fn run(&self, ctx: &mut InstallContext) -> TaskResult<()> {
        let window = ReconnectWindow::default();

        let cmd = if let Some(op_id) = ctx.outcome.operation_id.clone() {
            format!("install deactivate id {op_id}")
        } else {
            if ctx.job.software_packages.is_empty() {
                return Err(TaskError::invalid_job("no package list provided"));
            }
            let active_output = ctx
                .send("show install active", DEFAULT_COMMAND_TIMEOUT)
                .await?;
            let active = SoftwarePackage::from_show_output(&active_output);
            let desired = SoftwarePackage::from_tokens(&ctx.job.software_packages);
            // Whatever would have to be added is, by definition, not
            // active and cannot be deactivated.
            let not_active = diff(&active, &desired).to_add;

            let to_deactivate: Vec<&str> = ctx
                .job
                .software_packages
                .iter()
                .map(String::as_str)
                .filter(|token| match SoftwarePackage::parse(token) {
                    Some(pkg) => !not_active.contains(&pkg),
                    None => true,
                })
                .collect();

            if to_deactivate.is_empty() {
                info!("none of the selected packages is active on the device");
                ctx.post_status("Packages already inactive");
                return Ok(());
            }
            format!("install deactivate {}", to_deactivate.join(" "))
        };

        ctx.post_status("Deactivate Package(s) Pending");
        let outcome = execute_install(ctx, "install deactivate", &cmd, &window).await?;
        if outcome.no_impact {
            ctx.post_status("Packages already inactive");
            return Ok(());
        }

        refresh_package_snapshot(ctx).await?;
        info!("package(s) deactivated successfully");
        ctx.post_status("Package(s) Deactivated Successfully");
        Ok(())
    }
}
