//! Pre-phase validation units.
//!
//! The scheduler runs these automatically before the mutating phases; a
//! failure here aborts the requested phase before any device state
//! changes. Checks are deliberately idempotent queries only.

use async_trait::async_trait;
use tracing::warn;

use instmgr_core::{InstallContext, InstallPlugin, Phase, Platform, TaskError, TaskResult};

use crate::install::{ensure_no_operation_in_progress, filter_packages};
use crate::XR_PLATFORMS;

/// Validates the job and the device before packages are added.
pub struct PreAddPlugin;

#[async_trait]
impl InstallPlugin for PreAddPlugin {
    fn name(&self) -> &'static str {
        "pre-add-check"
    }

    fn platforms(&self) -> &'static [Platform] {
        XR_PLATFORMS
    }

    fn phases(&self) -> &'static [Phase] {
        &[Phase::PreAdd]
    }

    async fn run(&self, ctx: &mut InstallContext) -> TaskResult<()> {
        if ctx.job.repository_url.is_none() {
            return Err(TaskError::invalid_job("no repository provided"));
        }
        let (s_packages, _) = filter_packages(ctx.job.family, &ctx.job.software_packages);
        if s_packages.is_empty() {
            return Err(TaskError::invalid_job(
                "none of the selected package(s) has an acceptable file extension",
            ));
        }
        ensure_no_operation_in_progress(ctx).await
    }
}

/// Validates the device before packages are activated.
pub struct PreActivatePlugin;

#[async_trait]
impl InstallPlugin for PreActivatePlugin {
    fn name(&self) -> &'static str {
        "pre-activate-check"
    }

    fn platforms(&self) -> &'static [Platform] {
        XR_PLATFORMS
    }

    fn phases(&self) -> &'static [Phase] {
        &[Phase::PreActivate]
    }

    async fn run(&self, ctx: &mut InstallContext) -> TaskResult<()> {
        if ctx.job.software_packages.is_empty() && ctx.outcome.operation_id.is_none() {
            return Err(TaskError::invalid_job(
                "nothing to activate: no packages selected and no stored operation",
            ));
        }
        ensure_no_operation_in_progress(ctx).await
    }
}

/// Validates the device before packages are deactivated.
pub struct PreDeactivatePlugin;

#[async_trait]
impl InstallPlugin for PreDeactivatePlugin {
    fn name(&self) -> &'static str {
        "pre-deactivate-check"
    }

    fn platforms(&self) -> &'static [Platform] {
        XR_PLATFORMS
    }

    fn phases(&self) -> &'static [Phase] {
        &[Phase::PreDeactivate]
    }

    async fn run(&self, ctx: &mut InstallContext) -> TaskResult<()> {
        if ctx.job.software_packages.is_empty() && ctx.outcome.operation_id.is_none() {
            warn!("no packages selected for deactivation");
            return Err(TaskError::invalid_job(
                "nothing to deactivate: no packages selected and no stored operation",
            ));
        }
        ensure_no_operation_in_progress(ctx).await
    }
}
