//! Plugin registry and phase dispatcher.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::InstallContext;
use crate::phase::Phase;
use crate::plugin::InstallPlugin;
use crate::task::TaskStatus;

/// Result of dispatching one unit.
#[derive(Debug, Clone)]
pub struct PluginResult {
    /// Unit name.
    pub plugin: String,
    /// Phase the unit ran in.
    pub phase: Phase,
    /// How the run ended.
    pub status: TaskStatus,
    /// Failure description (with raw device output), when the run failed.
    pub detail: Option<String>,
}

impl PluginResult {
    /// Returns true if the unit completed successfully.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Explicit registry of operation units plus the phase dispatcher.
///
/// Units run serially in registration order: device CLI sessions are
/// single-threaded, so there is nothing to parallelize. Selection is the
/// conjunction of the platform filter (from the job), the phase filter and
/// an optional name filter; non-matching units are skipped silently.
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Arc<dyn InstallPlugin>>,
    name_filter: Option<BTreeSet<String>>,
}

impl PluginManager {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a unit. Registration order is execution order.
    pub fn register(&mut self, plugin: Arc<dyn InstallPlugin>) {
        self.plugins.push(plugin);
    }

    /// Restricts dispatch to units with the given names.
    ///
    /// `None` clears the filter.
    pub fn set_name_filter<I, S>(&mut self, names: Option<I>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.name_filter = names.map(|n| n.into_iter().map(Into::into).collect());
    }

    /// Lists the registered units as (name, platforms, phases).
    pub fn registered(&self) -> Vec<(&'static str, Vec<String>, Vec<String>)> {
        self.plugins
            .iter()
            .map(|p| {
                (
                    p.name(),
                    p.platforms().iter().map(|f| f.to_string()).collect(),
                    p.phases().iter().map(|ph| ph.to_string()).collect(),
                )
            })
            .collect()
    }

    fn matching(&self, ctx: &InstallContext, phase: Phase) -> Vec<Arc<dyn InstallPlugin>> {
        self.plugins
            .iter()
            .filter(|p| {
                if !p.phases().contains(&phase) {
                    return false;
                }
                if !p.platforms().contains(&ctx.job.family) {
                    debug!(plugin = p.name(), family = %ctx.job.family, "skipped: platform mismatch");
                    return false;
                }
                if let Some(names) = &self.name_filter {
                    if !names.contains(p.name()) {
                        debug!(plugin = p.name(), "skipped: name filter");
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect()
    }

    /// Dispatches a phase.
    ///
    /// For Add, Activate and Deactivate the corresponding pre-phase runs
    /// first across all matching units; a pre-phase failure aborts the
    /// requested phase entirely. Within a phase, dispatch stops at the
    /// first failing unit, since later units assume earlier ones succeeded.
    pub async fn dispatch(&self, phase: Phase, ctx: &mut InstallContext) -> Vec<PluginResult> {
        let mut results = Vec::new();

        if let Some(pre) = phase.auto_pre() {
            info!(phase = %pre, "phase");
            if !self.run_phase(pre, ctx, &mut results).await {
                warn!(phase = %phase, "pre-phase failed, aborting the requested phase");
                return results;
            }
        }

        info!(phase = %phase, "phase");
        self.run_phase(phase, ctx, &mut results).await;
        results
    }

    /// Runs every matching unit of `phase`. Returns false when a unit
    /// failed (and dispatch of this phase stopped).
    async fn run_phase(
        &self,
        phase: Phase,
        ctx: &mut InstallContext,
        results: &mut Vec<PluginResult>,
    ) -> bool {
        for plugin in self.matching(ctx, phase) {
            info!(plugin = plugin.name(), phase = %phase, "dispatching");
            match plugin.run(ctx).await {
                Ok(()) => results.push(PluginResult {
                    plugin: plugin.name().to_string(),
                    phase,
                    status: TaskStatus::Success,
                    detail: None,
                }),
                Err(e) => {
                    warn!(plugin = plugin.name(), phase = %phase, error = %e, "unit failed");
                    results.push(PluginResult {
                        plugin: plugin.name().to_string(),
                        phase,
                        status: e.to_status(),
                        detail: Some(e.to_string()),
                    });
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use instmgr_common::{ExpectMatch, SessionError, SessionLine, SessionResult};
    use regex::Regex;

    use super::*;
    use crate::context::InstallJob;
    use crate::platform::Platform;
    use crate::task::{TaskError, TaskResult};

    struct NullSession;

    #[async_trait]
    impl SessionLine for NullSession {
        async fn send(&mut self, _command: &str, _timeout: Duration) -> SessionResult<String> {
            Ok(String::new())
        }

        async fn send_expect(
            &mut self,
            _command: Option<&str>,
            _patterns: &[Regex],
            timeout: Duration,
        ) -> SessionResult<ExpectMatch> {
            Err(SessionError::timeout("pattern", timeout))
        }

        async fn disconnect(&mut self) {}

        async fn reconnect(&mut self, _max_timeout: Duration) -> SessionResult<()> {
            Ok(())
        }
    }

    /// Unit that records its invocations and optionally fails.
    struct Probe {
        name: &'static str,
        platforms: &'static [Platform],
        phases: &'static [Phase],
        fail: bool,
        log: Arc<Mutex<Vec<(&'static str, Phase)>>>,
    }

    #[async_trait]
    impl InstallPlugin for Probe {
        fn name(&self) -> &'static str {
            self.name
        }

        fn platforms(&self) -> &'static [Platform] {
            self.platforms
        }

        fn phases(&self) -> &'static [Phase] {
            self.phases
        }

        async fn run(&self, _ctx: &mut InstallContext) -> TaskResult<()> {
            // The phase is not visible to the unit; record the name only
            // and let the caller pair it with the dispatched phase.
            self.log
                .lock()
                .unwrap()
                .push((self.name, *self.phases.first().unwrap()));
            if self.fail {
                Err(TaskError::operation("probe failed", "Error: probe"))
            } else {
                Ok(())
            }
        }
    }

    const ASR9K_ONLY: &[Platform] = &[Platform::Asr9k];
    const PRE_ACTIVATE: &[Phase] = &[Phase::PreActivate];
    const ACTIVATE: &[Phase] = &[Phase::Activate];

    fn ctx() -> InstallContext {
        InstallContext::new(Box::new(NullSession), InstallJob::new(Platform::Asr9k))
    }

    fn manager_with(
        log: &Arc<Mutex<Vec<(&'static str, Phase)>>>,
        pre_fails: bool,
    ) -> PluginManager {
        let mut manager = PluginManager::new();
        manager.register(Arc::new(Probe {
            name: "pre-activate check",
            platforms: ASR9K_ONLY,
            phases: PRE_ACTIVATE,
            fail: pre_fails,
            log: log.clone(),
        }));
        manager.register(Arc::new(Probe {
            name: "activate",
            platforms: ASR9K_ONLY,
            phases: ACTIVATE,
            fail: false,
            log: log.clone(),
        }));
        manager
    }

    #[tokio::test]
    async fn test_auto_pre_runs_before_the_requested_phase() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = manager_with(&log, false);

        let results = manager.dispatch(Phase::Activate, &mut ctx()).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(PluginResult::is_success));

        let order: Vec<_> = log.lock().unwrap().iter().map(|(n, _)| *n).collect();
        assert_eq!(order, vec!["pre-activate check", "activate"]);
    }

    #[tokio::test]
    async fn test_pre_phase_failure_aborts_the_requested_phase() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = manager_with(&log, true);

        let results = manager.dispatch(Phase::Activate, &mut ctx()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TaskStatus::Failed);

        let order: Vec<_> = log.lock().unwrap().iter().map(|(n, _)| *n).collect();
        assert_eq!(order, vec!["pre-activate check"]);
    }

    #[tokio::test]
    async fn test_platform_mismatch_is_a_silent_skip() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = PluginManager::new();
        manager.register(Arc::new(Probe {
            name: "ncs6k only",
            platforms: &[Platform::Ncs6k],
            phases: ACTIVATE,
            fail: false,
            log: log.clone(),
        }));

        let results = manager.dispatch(Phase::Activate, &mut ctx()).await;
        assert!(results.is_empty());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_name_filter_selects_units() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager_with(&log, false);
        manager.set_name_filter(Some(["activate"]));

        let results = manager.dispatch(Phase::Activate, &mut ctx()).await;
        // The pre-phase has no unit named "activate": nothing ran there,
        // which is not a failure.
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].plugin, "activate");
    }

    #[tokio::test]
    async fn test_failure_stops_later_units_in_the_same_phase() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = PluginManager::new();
        manager.register(Arc::new(Probe {
            name: "first",
            platforms: ASR9K_ONLY,
            phases: ACTIVATE,
            fail: true,
            log: log.clone(),
        }));
        manager.register(Arc::new(Probe {
            name: "second",
            platforms: ASR9K_ONLY,
            phases: ACTIVATE,
            fail: false,
            log: log.clone(),
        }));

        let results = manager.dispatch(Phase::Activate, &mut ctx()).await;
        let names: Vec<_> = results.iter().map(|r| r.plugin.as_str()).collect();
        assert_eq!(names, vec!["first"]);
    }
}
