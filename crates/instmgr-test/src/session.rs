//! Scripted mock session.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use instmgr_common::{ExpectMatch, SessionError, SessionLine, SessionResult};

enum Reply {
    Text {
        /// When set, the sent command must equal this.
        expect: Option<String>,
        output: String,
    },
    Timeout,
}

#[derive(Default)]
struct Inner {
    script: VecDeque<Reply>,
    reconnects: VecDeque<bool>,
    connected: bool,
    sent: Vec<String>,
}

/// Session line driven by a scripted reply queue.
///
/// Each wait on the session consumes the next scripted reply; a `Text`
/// reply is matched against the registered patterns in declaration order,
/// a `Timeout` reply times the wait out. The session is cheaply cloneable
/// (clones share the script and the sent-command log), so tests can keep a
/// handle for assertions after moving it into an `InstallContext`.
///
/// Script exhaustion and command mismatches panic with a descriptive
/// message: in a test, both mean the scenario script is wrong.
#[derive(Clone)]
pub struct ScriptedSession {
    inner: Arc<Mutex<Inner>>,
}

impl Default for ScriptedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSession {
    /// Creates an empty, connected session.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                connected: true,
                ..Inner::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Scripts a reply and asserts the command that triggers it.
    pub fn expect_command(&self, command: impl Into<String>, output: impl Into<String>) -> &Self {
        self.lock().script.push_back(Reply::Text {
            expect: Some(command.into()),
            output: output.into(),
        });
        self
    }

    /// Scripts a reply without asserting the command.
    pub fn push_reply(&self, output: impl Into<String>) -> &Self {
        self.lock().script.push_back(Reply::Text {
            expect: None,
            output: output.into(),
        });
        self
    }

    /// Scripts a timed-out wait.
    pub fn push_timeout(&self) -> &Self {
        self.lock().script.push_back(Reply::Timeout);
        self
    }

    /// Scripts the outcome of the next reconnect attempt.
    pub fn push_reconnect(&self, ok: bool) -> &Self {
        self.lock().reconnects.push_back(ok);
        self
    }

    /// Every command sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Number of unconsumed scripted replies.
    pub fn remaining(&self) -> usize {
        self.lock().script.len()
    }

    /// Whether the session is currently connected.
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn next_reply(&self, command: Option<&str>, timeout: Duration) -> SessionResult<String> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(SessionError::NotConnected);
        }
        if let Some(command) = command {
            inner.sent.push(command.to_string());
        }
        match inner.script.pop_front() {
            Some(Reply::Text { expect, output }) => {
                if let Some(expected) = expect {
                    let actual = command.unwrap_or("<wait>");
                    assert_eq!(
                        expected, actual,
                        "scripted session expected command '{expected}', got '{actual}'"
                    );
                }
                Ok(output)
            }
            Some(Reply::Timeout) => Err(SessionError::timeout(
                command.unwrap_or("<wait>").to_string(),
                timeout,
            )),
            None => panic!(
                "scripted session exhausted; unexpected command: {:?}",
                command
            ),
        }
    }
}

#[async_trait]
impl SessionLine for ScriptedSession {
    async fn send(&mut self, command: &str, timeout: Duration) -> SessionResult<String> {
        self.next_reply(Some(command), timeout)
    }

    async fn send_expect(
        &mut self,
        command: Option<&str>,
        patterns: &[Regex],
        timeout: Duration,
    ) -> SessionResult<ExpectMatch> {
        let text = self.next_reply(command, timeout)?;
        for (index, pattern) in patterns.iter().enumerate() {
            if let Some(m) = pattern.find(&text) {
                return Ok(ExpectMatch {
                    index,
                    before: text[..m.start()].to_string(),
                    matched: m.as_str().to_string(),
                });
            }
        }
        Err(SessionError::timeout("pattern", timeout))
    }

    async fn disconnect(&mut self) {
        self.lock().connected = false;
    }

    async fn reconnect(&mut self, max_timeout: Duration) -> SessionResult<()> {
        let mut inner = self.lock();
        match inner.reconnects.pop_front() {
            Some(true) => {
                inner.connected = true;
                Ok(())
            }
            _ => Err(SessionError::ReconnectFailed {
                ceiling: max_timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let session = ScriptedSession::new();
        session
            .expect_command("show install request", "No install operation in progress")
            .push_timeout();

        let mut line = session.clone();
        let output = line
            .send("show install request", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.contains("No install"));

        let err = line
            .send("show install request", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(session.sent().len(), 2);
        assert_eq!(session.remaining(), 0);
    }

    #[tokio::test]
    async fn test_expect_matches_patterns_in_order() {
        let session = ScriptedSession::new();
        session.push_reply("Install operation 28 aborted");

        let patterns = [
            Regex::new("finished successfully").unwrap(),
            Regex::new("aborted").unwrap(),
        ];
        let mut line = session.clone();
        let m = line
            .send_expect(None, &patterns, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(m.index, 1);
        assert!(m.before.contains("28"));
    }

    #[tokio::test]
    async fn test_disconnect_and_reconnect() {
        let session = ScriptedSession::new();
        session.push_reconnect(true);

        let mut line = session.clone();
        line.disconnect().await;
        assert!(!session.is_connected());
        let err = line.send("show version", Duration::from_secs(5)).await;
        assert!(matches!(err, Err(SessionError::NotConnected)));

        line.reconnect(Duration::from_secs(10)).await.unwrap();
        assert!(session.is_connected());
    }
}
