//! Pre-phase gating across real units.

use instmgr_core::{InstallContext, InstallJob, Phase, Platform, PluginManager, TaskStatus};
use instmgr_test::{fixtures, ScriptedSession};
use instmgr_xr::default_plugins;

fn manager() -> PluginManager {
    let mut manager = PluginManager::new();
    for plugin in default_plugins() {
        manager.register(plugin);
    }
    manager
}

/// An install operation already running on the device fails the
/// Pre-Activate check, and the Activate unit never touches the session.
#[tokio::test]
async fn test_activate_is_gated_on_the_pre_phase() {
    let session = ScriptedSession::new();
    let progress = fixtures::operation_progress("17", 30);
    session.expect_command("show install request", progress);

    let job = InstallJob::new(Platform::Asr9k).with_packages(["disk0:asr9k-mpls-px-5.3.3"]);
    let mut ctx = InstallContext::new(Box::new(session.clone()), job);

    let results = manager().dispatch(Phase::Activate, &mut ctx).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].plugin, "pre-activate-check");
    assert_eq!(results[0].status, TaskStatus::Failed);
    assert!(results[0]
        .detail
        .as_deref()
        .unwrap()
        .contains("another install operation is in progress"));

    // Only the status query ran; the activate command was never issued.
    assert_eq!(session.sent(), vec!["show install request".to_string()]);
}

/// The Commit phase has no auto-pre: the unit runs directly.
#[tokio::test]
async fn test_commit_has_no_auto_pre_phase() {
    let session = ScriptedSession::new();
    session
        .push_reply(fixtures::ADD_ACCEPTED.replace("add", "commit"))
        .push_reply(fixtures::operation_success("12"))
        .expect_command("show install request", fixtures::NO_INSTALL_IN_PROGRESS)
        .expect_command("show install active", fixtures::SHOW_INSTALL_ACTIVE_FULL)
        .expect_command("show install inactive", "No inactive packages")
        .expect_command("show install committed", fixtures::SHOW_INSTALL_ACTIVE_FULL);

    let job = InstallJob::new(Platform::Asr9k);
    let mut ctx = InstallContext::new(Box::new(session.clone()), job);

    let results = manager().dispatch(Phase::Commit, &mut ctx).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].plugin, "install-commit");
    assert_eq!(results[0].status, TaskStatus::Success);
    assert_eq!(session.remaining(), 0);
}
