//! Asynchronous operation watcher.
//!
//! Install operations run as device-side background jobs identified by a
//! device-issued integer. [`watch_operation`] polls the status query until
//! the job is reported complete, racing a short blocking wait for the exact
//! success line to catch fast operations early. [`wait_for_reload`] is the
//! reload barrier: once a reboot is expected, no command is issued until
//! the device is reachable again and every CPU node reports a stable state.
//!
//! A watch is never considered failed merely because the session dropped;
//! callers that expect a reload catch the timeout and enter the barrier.
//! Percentage-complete values are advisory only and are not required to be
//! monotonic: devices may legitimately restart a sub-step at 0%.

use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::time::sleep;
use tracing::info;

use crate::error::SessionError;
use crate::inventory::{parse_show_platform, validate_node_states};
use crate::session::{SessionLine, StatusSink, DEFAULT_COMMAND_TIMEOUT};

/// Status query for the in-progress install operation.
pub const SHOW_INSTALL_REQUEST: &str = "show install request";

/// Node status query issued after a reload.
pub const ADMIN_SHOW_PLATFORM: &str = "admin show platform";

/// Signature reported when no operation is running (a previously watched
/// operation is then treated as completed).
pub const NO_INSTALL_IN_PROGRESS: &str = "No install operation in progress";

/// State every route processor must reach before the reload barrier lifts.
const XR_RUN_STATE: &str = "IOS XR RUN";

/// Window for the opportunistic wait on the exact success line.
const SUCCESS_WAIT: Duration = Duration::from_secs(20);

/// Result type alias for watch operations.
pub type WatchResult<T> = Result<T, WatchError>;

/// Errors that end a watch or a reload barrier.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The session failed underneath the watcher.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The device did not become reachable again after an expected reload.
    #[error("reload or boot failure: {message}")]
    ReloadOrBootFailure {
        /// What went wrong, including the underlying session error.
        message: String,
    },

    /// Nodes did not reach the accepted-stable state set in time.
    #[error("nodes failed to reach a stable state within {timeout:?}; last output: {last_output}")]
    NodeStateTimeout {
        /// The overall node-state window that elapsed.
        timeout: Duration,
        /// The last raw status output, for diagnosis.
        last_output: String,
    },
}

/// A device-side background operation being watched.
///
/// Owned exclusively by the watcher for the duration of one watch call;
/// discarded once the device stops reporting the operation as in progress.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    /// Device-issued operation identifier.
    pub operation_id: String,
    /// The command that started the operation.
    pub command: String,
    /// Whether completion is expected to drop the session in a reload.
    pub expects_reload: bool,
    /// Last progress text observed, for status reporting.
    pub last_progress: Option<String>,
}

impl OperationHandle {
    /// Creates a handle for a freshly accepted operation.
    pub fn new(operation_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            command: command.into(),
            expects_reload: false,
            last_progress: None,
        }
    }

    /// Marks the operation as one whose completion reloads the device.
    pub fn with_expected_reload(mut self) -> Self {
        self.expects_reload = true;
        self
    }
}

/// Timing of the post-reload reconnect barrier.
///
/// Once a disconnect is detected (or a reload is expected) no device
/// command may be issued until reconnection succeeds or the ceiling is
/// exceeded; this is a hard barrier, not a best-effort retry.
#[derive(Debug, Clone)]
pub struct ReconnectWindow {
    /// Sleep after disconnecting, before the first reconnect attempt.
    pub stabilization: Duration,
    /// Ceiling on the whole reconnect phase.
    pub reconnect_ceiling: Duration,
    /// Delay after reconnecting before the first node status query.
    pub settle: Duration,
    /// Interval between node status queries.
    pub poll_interval: Duration,
    /// Overall window for nodes to reach a stable state.
    pub node_timeout: Duration,
}

impl Default for ReconnectWindow {
    fn default() -> Self {
        Self {
            stabilization: Duration::from_secs(60),
            reconnect_ceiling: Duration::from_secs(1500),
            settle: Duration::from_secs(100),
            poll_interval: Duration::from_secs(30),
            node_timeout: Duration::from_secs(3600),
        }
    }
}

/// Watches a background operation until the device reports it complete.
///
/// Returns the final status-query output. Progress updates are posted to
/// `sink` whenever the reported percentage changes. A session timeout is
/// returned to the caller (as `WatchError::Session`) rather than retried:
/// on a reload path the caller enters [`wait_for_reload`] instead.
pub async fn watch_operation(
    session: &mut dyn SessionLine,
    handle: &mut OperationHandle,
    sink: &dyn StatusSink,
) -> WatchResult<String> {
    info!(operation = %handle.operation_id, "watching the operation to complete");

    let success_text = format!(
        "Install operation {} finished successfully",
        handle.operation_id
    );
    let success_pattern =
        [Regex::new(&regex::escape(&success_text)).expect("Invalid success pattern")];
    let progress_re = Regex::new(&format!(
        r"The install operation {} is (\d+)% complete",
        regex::escape(&handle.operation_id)
    ))
    .expect("Invalid progress pattern");

    loop {
        // Catch a fast completion as soon as possible; a timeout here just
        // means the operation is still running.
        match session
            .send_expect(Some(""), &success_pattern, SUCCESS_WAIT)
            .await
        {
            Ok(_) => break,
            Err(SessionError::Timeout { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let output = session
            .send(SHOW_INSTALL_REQUEST, DEFAULT_COMMAND_TIMEOUT)
            .await?;

        if output.contains(&handle.operation_id) {
            if let Some(m) = progress_re.find(&output) {
                let status = m.as_str();
                if handle.last_progress.as_deref() != Some(status) {
                    sink.post_status(status);
                    handle.last_progress = Some(status.to_string());
                }
            }
        }

        if output.contains(NO_INSTALL_IN_PROGRESS) {
            return Ok(output);
        }
    }

    let output = session
        .send(SHOW_INSTALL_REQUEST, DEFAULT_COMMAND_TIMEOUT)
        .await?;
    Ok(output)
}

/// Reload barrier: waits for the device to reboot and stabilize.
///
/// Disconnects, sleeps the stabilization interval, reconnects with the
/// extended ceiling, then polls the node status until every CPU node is in
/// an accepted state. Both a failed reconnect and a node-state timeout are
/// fatal; the raw output is carried for diagnosis.
pub async fn wait_for_reload(
    session: &mut dyn SessionLine,
    window: &ReconnectWindow,
    sink: &dyn StatusSink,
) -> WatchResult<()> {
    session.disconnect().await;
    sleep(window.stabilization).await;

    if let Err(e) = session.reconnect(window.reconnect_ceiling).await {
        return Err(WatchError::ReloadOrBootFailure {
            message: format!("device did not come back after reload: {e}"),
        });
    }

    info!("waiting for all nodes to come up");
    sink.post_status("Waiting for all nodes to come up");
    sleep(window.settle).await;

    let mut waited = Duration::ZERO;
    let mut last_output = String::new();
    while waited < window.node_timeout {
        sleep(window.poll_interval).await;
        waited += window.poll_interval;

        let output = session
            .send(ADMIN_SHOW_PLATFORM, DEFAULT_COMMAND_TIMEOUT)
            .await?;
        if output.contains(XR_RUN_STATE) {
            let inventory = parse_show_platform(&output);
            if validate_node_states(&inventory) {
                info!("all nodes in desired state");
                return Ok(());
            }
        }
        last_output = output;
    }

    Err(WatchError::NodeStateTimeout {
        timeout: window.node_timeout,
        last_output,
    })
}
