//! Console session line contract.
//!
//! A session line is a bidirectional text channel to a device console. The
//! transport behind it (SSH, telnet, terminal server) lives outside this
//! workspace; workflows only rely on the small contract defined here:
//! send a command and wait for the prompt, or wait until one of N patterns
//! appears in the stream.
//!
//! Only one command may be outstanding on a session at a time. The dialogue
//! executor and the operation watcher are sequential with respect to a
//! given session and must never be invoked concurrently on the same one.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::error::SessionResult;

/// Default window for an ordinary command to return to the prompt.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of a multi-pattern wait on the session stream.
#[derive(Debug, Clone)]
pub struct ExpectMatch {
    /// Index into the pattern slice of the pattern that matched.
    pub index: usize,
    /// Stream text preceding the match.
    pub before: String,
    /// The matched text itself.
    pub matched: String,
}

impl ExpectMatch {
    /// Returns the full text observed up to and including the match.
    pub fn full_text(&self) -> String {
        format!("{}{}", self.before, self.matched)
    }
}

/// Bidirectional text channel to a device console.
///
/// Implementations wrap a concrete transport. `patterns` are tried in
/// order; when several patterns occur in the same chunk of output the
/// earliest-declared one wins, so callers list specific patterns before
/// generic ones (e.g. a bare prompt).
#[async_trait]
pub trait SessionLine: Send {
    /// Sends a command and waits for the command prompt.
    ///
    /// Returns the output produced by the command, without the echoed
    /// command or the trailing prompt.
    async fn send(&mut self, command: &str, timeout: Duration) -> SessionResult<String>;

    /// Sends a command (when given) and waits until one of `patterns`
    /// matches the stream.
    ///
    /// With `command == None` the call only waits; this is how dialogue
    /// steps after the first observe the ongoing exchange.
    async fn send_expect(
        &mut self,
        command: Option<&str>,
        patterns: &[Regex],
        timeout: Duration,
    ) -> SessionResult<ExpectMatch>;

    /// Drops the connection. Idempotent.
    async fn disconnect(&mut self);

    /// Re-establishes the connection, retrying until `max_timeout` elapses.
    async fn reconnect(&mut self, max_timeout: Duration) -> SessionResult<()>;
}

/// Receiver for human-facing progress updates.
///
/// Long-running operations (background install jobs, reload barriers)
/// report coarse status through this seam so the hosting application can
/// surface it; the engine itself only logs.
pub trait StatusSink: Send + Sync {
    /// Posts a status message. Implementations are expected to deduplicate
    /// consecutive identical messages.
    fn post_status(&self, message: &str);
}

/// A [`StatusSink`] that forwards every update to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn post_status(&self, message: &str) {
        tracing::info!(status = %message, "progress");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_match_full_text() {
        let m = ExpectMatch {
            index: 0,
            before: "Install operation 12 started\n".to_string(),
            matched: "Install operation will continue in the background".to_string(),
        };
        assert!(m.full_text().starts_with("Install operation 12 started"));
        assert!(m.full_text().ends_with("background"));
    }

    #[test]
    fn test_log_sink_is_usable_as_trait_object() {
        let sink: &dyn StatusSink = &LogSink;
        sink.post_status("45% complete");
    }
}
