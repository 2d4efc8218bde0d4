//! In-service software upgrade (ISSU) sequencing.
//!
//! Exercises the ISSU path: add the package, extract it when it is an ISO,
//! validate `install prepare issu` (and clean up the prepared set), then
//! drive `install activate issu load`/`run`. Confirmation prompts raised
//! by the prepare and ISSU commands are answered inside the shared install
//! dialogue. Dispatched by explicit name filter under the Add phase.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use instmgr_common::ReconnectWindow;
use instmgr_core::{InstallContext, InstallPlugin, Phase, Platform, TaskError, TaskResult};

use crate::install::{
    added_package_name, execute_install, extracted_package_names, filter_packages,
};

const ADMIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the ISSU prepare/activate sequence.
pub struct IssuPlugin;

impl IssuPlugin {
    /// Validates `install prepare issu` for `package` and cleans the
    /// prepared set again.
    async fn check_prepare(
        &self,
        ctx: &mut InstallContext,
        package: &str,
        window: &ReconnectWindow,
    ) -> TaskResult<()> {
        let cmd = format!("install prepare issu {package}");
        execute_install(ctx, "install prepare issu", &cmd, window).await?;
        info!("package(s) prepared successfully");
        execute_install(ctx, "install prepare clean", "install prepare clean", window).await?;
        Ok(())
    }
}

#[async_trait]
impl InstallPlugin for IssuPlugin {
    fn name(&self) -> &'static str {
        "issu-upgrade"
    }

    fn platforms(&self) -> &'static [Platform] {
        &[Platform::Asr9k, Platform::Crs]
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
        let (s_packages, _) = filter_packages(ctx.job.family, &ctx.job.software_packages);
        if s_packages.is_empty() {
            return Err(TaskError::invalid_job(
                "none of the selected package(s) has an acceptable file extension",
            ));
        }
        let is_iso = s_packages.contains("iso");

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
        info!("package(s) added successfully");
        ctx.post_status("Add package(s) passed");

        let pkg_name = added_package_name(ctx, &op_id).await?;

        if is_iso {
            let cmd = format!("install extract {pkg_name}");
            let outcome = execute_install(ctx, "install extract", &cmd, &window).await?;
            let extract_id = outcome
                .operation_id
                .ok_or_else(|| TaskError::internal("extract finished without an operation id"))?;
            info!("package extracted successfully");

            let extracted = extracted_package_names(ctx, &extract_id, admin_mode).await?;
            self.check_prepare(ctx, &extracted, &window).await?;
            info!("validated issu prepare operation");

            let cmd = format!("install activate issu load {extracted}");
            execute_install(ctx, "install activate issu load", &cmd, &window).await?;
            execute_install(
                ctx,
                "install activate issu abort cleanup",
                "install activate issu abort cleanup",
                &window,
            )
            .await?;
            info!("validated install activate issu");
        } else {
            self.check_prepare(ctx, &pkg_name, &window).await?;
            info!("validated issu prepare operation");

            let cmd = format!("install activate issu load {pkg_name}");
            execute_install(ctx, "install activate issu load", &cmd, &window).await?;
            execute_install(
                ctx,
                "install activate issu run",
                "install activate issu run",
                &window,
            )
            .await?;
            info!("validated install activate issu run");

            let cmd = format!("install deactivate {pkg_name}");
            execute_install(ctx, "install deactivate", &cmd, &window).await?;
            info!("validated issu deactivate");
        }

        if admin_mode {
            ctx.send("exit", ADMIN_TIMEOUT).await?;
        }
        info!("issu sequence complete");
        Ok(())
    }
}
