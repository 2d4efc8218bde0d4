//! Install Remove: delete inactive packages from device storage.

use async_trait::async_trait;
use tracing::info;

use instmgr_common::{ReconnectWindow, DEFAULT_COMMAND_TIMEOUT};
use instmgr_core::{InstallContext, InstallPlugin, Phase, Platform, TaskError, TaskResult};

use crate::install::{execute_install, refresh_package_snapshot, verify_operation_log};
use crate::package::SoftwarePackage;
use crate::XR_PLATFORMS;

/// Removes the selected packages from the device.
///
/// Removing an active package is refused by the device with an abort; that
/// is caught up front by checking the active set, so the job fails with an
/// actionable message instead of a device abort mid-sequence.
pub struct RemovePlugin;

#[async_trait]
impl InstallPlugin for RemovePlugin {
    fn name(&self) -> &'static str {
        "install-remove"
    }

    fn platforms(&self) -> &'static [Platform] {
        XR_PLATFORMS
    }

    fn phases(&self) -> &'static [Phase] {
        &[Phase::Remove]
    }

    async fn run(&self, ctx: &mut InstallContext) -> TaskResult<()> {
        let window = ReconnectWindow::default();

        let cmd = if let Some(op_id) = ctx.outcome.operation_id.clone() {
            format!("install remove id {op_id}")
        } else {
            if ctx.job.software_packages.is_empty() {
                return Err(TaskError::invalid_job("no package list provided"));
            }
            let active_output = ctx
                .send("show install active", DEFAULT_COMMAND_TIMEOUT)
                .await?;
            let active = SoftwarePackage::from_show_output(&active_output);
            for token in &ctx.job.software_packages {
                if let Some(pkg) = SoftwarePackage::parse(token) {
                    if active.contains(&pkg) {
                        return Err(TaskError::invalid_job(format!(
                            "package '{token}' is still active; deactivate it before removing"
                        )));
                    }
                }
            }
            format!("install remove {}", ctx.job.software_packages.join(" "))
        };

        ctx.post_status("Remove Package(s) Pending");
        let outcome = execute_install(ctx, "install remove", &cmd, &window).await?;

        if let Some(op_id) = outcome.operation_id.clone() {
            verify_operation_log(ctx, &op_id).await?;
        }

        refresh_package_snapshot(ctx).await?;
        info!("package(s) removed successfully");
        ctx.post_status("Package(s) Removed Successfully");
        Ok(())
    }
}
