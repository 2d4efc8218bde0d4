//! Sequenced software upgrade: add, activate by id, commit.
//!
//! One unit driving a whole upgrade on a single device, for jobs where
//! the phases are not scheduled individually. Dispatched by explicit name
//! filter under the Add phase.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use instmgr_common::ReconnectWindow;
use instmgr_core::{InstallContext, InstallPlugin, Phase, Platform, TaskError, TaskResult};

use crate::install::{added_package_name, execute_install, filter_packages};
use crate::XR_PLATFORMS;

const ADMIN_TIMEOUT: Duration = Duration::from_secs(30);
const SHOW_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs the full add → activate → commit sequence.
///
/// Activation by operation id may reboot the device; the reload barrier is
/// handled inside the shared install dialogue.
pub struct SoftwareUpgradePlugin;

#[async_trait]
impl InstallPlugin for SoftwareUpgradePlugin {
    fn name(&self) -> &'static str {
        "software-upgrade"
    }

    fn platforms(&self) -> &'static [Platform] {
        XR_PLATFORMS
    }

    fn phases(&self) -> &'static [Phase] {
        &[Phase::Add]
    }

    async fn run(&self, ctx: &mut InstallContext) -> TaskResult<()> {
        let repository_url = ctx
            .job
            .repository_url
            .clone()
            .ok_or_else(|| TaskError::invalid_job("no repository provided"))?;
        if ctx.job.software_packages.is_empty() {
            return Err(TaskError::invalid_job("no package list provided"));
        }
        let (s_packages, has_tar) = filter_packages(ctx.job.family, &ctx.job.software_packages);
        if s_packages.is_empty() {
            return Err(TaskError::invalid_job(
                "none of the selected package(s) has an acceptable file extension",
            ));
        }

        let window = ReconnectWindow::default();
        let admin_mode = ctx.job.admin_mode;
        if admin_mode {
            ctx.send("admin", ADMIN_TIMEOUT).await?;
        }

        let cmd = format!("install add source {repository_url} {s_packages}");
        let outcome = execute_install(ctx, "install add", &cmd, &window).await?;
        let op_id = outcome
            .operation_id
            .ok_or_else(|| TaskError::internal("add finished without an operation id"))?;
        if has_tar {
            info!(operation = %op_id, "operation id stored");
            ctx.outcome.operation_id = Some(op_id.clone());
        }
        info!("package(s) added successfully");
        ctx.post_status("Add package(s) passed");

        let pkg_name = added_package_name(ctx, &op_id).await?;
        let details = ctx
            .send(&format!("show install package {pkg_name}"), SHOW_TIMEOUT)
            .await?;
        info!(package = %pkg_name, details = %details, "added package");

        let cmd = format!("install activate id {op_id}");
        execute_install(ctx, "install activate", &cmd, &window).await?;
        info!("package(s) activated successfully");
        ctx.post_status("Activate package(s) passed");

        execute_install(ctx, "install commit", "install commit", &window).await?;
        info!("package(s) committed successfully");
        ctx.post_status("Commit package(s) passed");

        if admin_mode {
            ctx.send("exit", ADMIN_TIMEOUT).await?;
        }
        info!("software upgrade complete");
        Ok(())
    }
}
