//! Activate workflows that cross the reload barrier.
//!
//! The scripted device answers the activate with the reload confirmation
//! prompt, drops the session mid-watch, and either comes back (success) or
//! never does (reload/boot failure). Time is paused: the stabilization and
//! poll sleeps auto-advance.

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

fn activate_job() -> InstallJob {
    InstallJob::new(Platform::Asr9k).with_packages(["disk0:asr9k-mpls-px-5.3.3"])
}

#[tokio::test(start_paused = true)]
async fn test_activate_reload_succeeds_after_reconnect() {
    let session = ScriptedSession::new();
    session
        .expect_command("show install request", fixtures::NO_INSTALL_IN_PROGRESS)
        .expect_command("show install active", fixtures::SHOW_INSTALL_ACTIVE_PARTIAL)
        .expect_command(
            "install activate disk0:asr9k-mpls-px-5.3.3",
            fixtures::ACTIVATE_REBOOT_PROMPT,
        )
        // The watch times out twice: the device is already rebooting.
        .push_timeout()
        .push_timeout()
        .push_reconnect(true)
        .expect_command("admin show platform", fixtures::SHOW_PLATFORM_OK)
        .expect_command("show install active", fixtures::SHOW_INSTALL_ACTIVE_FULL)
        .expect_command("show install inactive", "No inactive packages")
        .expect_command("show install committed", fixtures::SHOW_INSTALL_ACTIVE_FULL);

    let mut ctx = InstallContext::new(Box::new(session.clone()), activate_job());
    let results = manager().dispatch(Phase::Activate, &mut ctx).await;

    assert!(
        results.iter().all(|r| r.status.is_success()),
        "results: {results:?}"
    );
    assert!(session.is_connected());
    assert!(session.sent().contains(&"admin show platform".to_string()));
    assert_eq!(session.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_activate_reload_fails_when_device_never_returns() {
    let session = ScriptedSession::new();
    session
        .expect_command("show install request", fixtures::NO_INSTALL_IN_PROGRESS)
        .expect_command("show install active", fixtures::SHOW_INSTALL_ACTIVE_PARTIAL)
        .expect_command(
            "install activate disk0:asr9k-mpls-px-5.3.3",
            fixtures::ACTIVATE_REBOOT_PROMPT,
        )
        .push_timeout()
        .push_timeout()
        .push_reconnect(false);

    let mut ctx = InstallContext::new(Box::new(session.clone()), activate_job());
    let results = manager().dispatch(Phase::Activate, &mut ctx).await;

    let activate = results.last().unwrap();
    assert_eq!(activate.plugin, "install-activate");
    assert_eq!(activate.status, TaskStatus::Failed);
    assert!(activate
        .detail
        .as_deref()
        .unwrap()
        .contains("reload or boot failure"));
    assert!(!session.is_connected());
}
