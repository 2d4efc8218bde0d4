//! Per-job install context.
//!
//! One context exists per job run. It owns the session line for the target
//! device, the job parameters, and the explicit outcome struct operation
//! units record into; there is no shared mutable unit state and no
//! reflective probing of optional result fields.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use instmgr_common::{SessionLine, SessionResult, StatusSink};

use crate::platform::Platform;

/// Parameters of one install job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallJob {
    /// Target platform family.
    pub family: Platform,
    /// Raw package tokens selected for the job (external file names).
    #[serde(default)]
    pub software_packages: Vec<String>,
    /// Repository the packages are fetched from
    /// (`tftp://…`, `ftp://user:pass@…`, `sftp://user:pass@…`).
    #[serde(default)]
    pub repository_url: Option<String>,
    /// Run the operation sequence from the administrative plane.
    #[serde(default)]
    pub admin_mode: bool,
}

impl InstallJob {
    /// Creates a job for `family` with no packages or repository.
    pub fn new(family: Platform) -> Self {
        Self {
            family,
            software_packages: Vec::new(),
            repository_url: None,
            admin_mode: false,
        }
    }

    /// Sets the package list.
    pub fn with_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.software_packages = packages.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the repository URL.
    pub fn with_repository(mut self, url: impl Into<String>) -> Self {
        self.repository_url = Some(url.into());
        self
    }
}

/// Results carried across operation units within one job.
///
/// All fields are optional; a unit that did not run (or had nothing to
/// report) leaves them unset.
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    /// Device-issued id of the last accepted operation (kept so a later
    /// unit can activate "by id" what an earlier unit added).
    pub operation_id: Option<String>,
    /// Raw `show install active` listing from the last snapshot refresh.
    pub active_packages: Option<String>,
    /// Raw `show install inactive` listing from the last snapshot refresh.
    pub inactive_packages: Option<String>,
    /// Raw `show install committed` listing from the last snapshot refresh.
    pub committed_packages: Option<String>,
}

/// Deduplicating status line.
///
/// Consecutive identical updates are collapsed; long watches post the same
/// progress text on every poll.
#[derive(Debug, Default)]
pub struct StatusLine {
    last: Mutex<Option<String>>,
}

impl StatusLine {
    /// Returns the most recently posted status, if any.
    pub fn last(&self) -> Option<String> {
        self.last
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl StatusSink for StatusLine {
    fn post_status(&self, message: &str) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if last.as_deref() != Some(message) {
            tracing::info!(status = %message, "progress");
            *last = Some(message.to_string());
        }
    }
}

/// Context handed to every operation unit.
pub struct InstallContext {
    session: Box<dyn SessionLine>,
    /// Job parameters.
    pub job: InstallJob,
    /// Results carried between units.
    pub outcome: JobOutcome,
    status: StatusLine,
}

impl InstallContext {
    /// Creates a context for `job` over `session`.
    pub fn new(session: Box<dyn SessionLine>, job: InstallJob) -> Self {
        Self {
            session,
            job,
            outcome: JobOutcome::default(),
            status: StatusLine::default(),
        }
    }

    /// Returns the session line.
    pub fn session_mut(&mut self) -> &mut dyn SessionLine {
        &mut *self.session
    }

    /// Returns the status line.
    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    /// Splits the context into the session and the status sink.
    ///
    /// Dialogue and watcher calls need both at once; the split keeps the
    /// borrows disjoint.
    pub fn session_and_sink(&mut self) -> (&mut dyn SessionLine, &StatusLine) {
        (&mut *self.session, &self.status)
    }

    /// Posts a status update.
    pub fn post_status(&self, message: &str) {
        self.status.post_status(message);
    }

    /// Sends a command and waits for the prompt.
    pub async fn send(&mut self, command: &str, timeout: Duration) -> SessionResult<String> {
        self.session.send(command, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use instmgr_common::ExpectMatch;
    use regex::Regex;

    use super::*;

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
            Err(instmgr_common::SessionError::timeout("pattern", timeout))
        }

        async fn disconnect(&mut self) {}

        async fn reconnect(&mut self, _max_timeout: Duration) -> SessionResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_status_line_deduplicates() {
        let status = StatusLine::default();
        status.post_status("The install operation 17 is 45% complete");
        status.post_status("The install operation 17 is 45% complete");
        status.post_status("The install operation 17 is 60% complete");
        assert_eq!(
            status.last().as_deref(),
            Some("The install operation 17 is 60% complete")
        );
    }

    #[test]
    fn test_job_from_json() {
        let job: InstallJob = serde_json::from_str(
            r#"{
                "family": "NCS6K",
                "software_packages": ["ncs6k-mpls.pkg-6.1.0"],
                "repository_url": "tftp://223.255.254.254/images"
            }"#,
        )
        .unwrap();
        assert_eq!(job.family, Platform::Ncs6k);
        assert_eq!(job.software_packages.len(), 1);
        assert!(!job.admin_mode);
    }

    #[tokio::test]
    async fn test_split_borrows_are_usable_together() {
        let job = InstallJob::new(Platform::Asr9k);
        let mut ctx = InstallContext::new(Box::new(NullSession), job);
        let (session, sink) = ctx.session_and_sink();
        sink.post_status("Add Package(s) Pending");
        let _ = session.send("show install request", Duration::from_secs(5)).await;
        assert_eq!(ctx.status().last().as_deref(), Some("Add Package(s) Pending"));
    }
}
