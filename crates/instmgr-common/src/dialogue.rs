//! Dialogue state machine executor.
//!
//! Device install commands are multi-turn conversations: the device may
//! answer with a background-continuation notice, an interactive
//! confirmation prompt, a reboot warning, or an abort message, and the
//! wording of those outcomes is close enough that ad-hoc string checks
//! desynchronize easily. Every such exchange is expressed here as a
//! [`Dialogue`]: an ordered pattern set plus a transition table of
//! `(pattern, valid states, next state, handler, timeout)` rows, executed
//! against a [`SessionLine`] until the terminal state is reached or a
//! budget runs out.
//!
//! Rules enforced by the executor:
//!
//! - the command is sent once, on the first step; later steps only wait
//! - each transition carries its own timeout (a confirmation prompt may
//!   allow seconds while a background job may allow hours); the timeout of
//!   the transition just taken bounds the next wait
//! - a transition flagged as aborting wins over ordinary lookup in any
//!   state: the device's own abort signature is global, not state-scoped
//! - a recognized pattern with no valid transition for the current state
//!   is a protocol desync and fails the run immediately
//! - a step counter bounds the total number of transitions

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::session::{SessionLine, StatusSink};

/// The terminal state of every dialogue.
pub const TERMINAL_STATE: i32 = -1;

/// Default ceiling on the number of transitions in one run.
const DEFAULT_MAX_STEPS: usize = 20;

/// Result type alias for dialogue execution.
pub type DialogueResult<T> = Result<T, DialogueError>;

/// Errors that end a dialogue run abnormally.
///
/// An ordinary failed verdict (abort signature, failing handler, step
/// budget) is reported through [`ExchangeOutcome`], not through this type;
/// these variants are reserved for conditions where the machine itself can
/// no longer be trusted.
#[derive(Debug, Error)]
pub enum DialogueError {
    /// A recognized pattern occurred in a state where it has no valid
    /// transition. The exchange output is carried for diagnosis.
    #[error("pattern '{pattern}' matched in state {state} with no valid transition; output: {output}")]
    ProtocolDesync {
        /// The pattern that matched.
        pattern: String,
        /// The state the machine was in.
        state: i32,
        /// Everything observed on the session during this run.
        output: String,
    },

    /// The session failed or timed out while waiting for a pattern.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Verdict returned by a transition handler.
#[derive(Debug)]
pub enum HandlerVerdict {
    /// Advance to the transition's target state.
    Proceed,
    /// Fail the run with the given reason.
    Fail(String),
}

/// Per-run result of a dialogue.
///
/// This replaces ad-hoc mutable fields on workflow units: handlers record
/// what they learned (the device-issued operation id, whether a reload
/// barrier was crossed) here, and callers read it after the run.
#[derive(Debug, Clone, Default)]
pub struct ExchangeOutcome {
    /// True when the terminal state was reached through a success path.
    pub success: bool,
    /// True when the device's abort signature ended the run.
    pub aborted: bool,
    /// True when the device reported the command as a no-impact operation.
    pub no_impact: bool,
    /// True when a reload barrier was crossed during the run.
    pub reload_performed: bool,
    /// Device-issued operation identifier, when one was observed.
    pub operation_id: Option<String>,
    /// Failure reason when `success` is false.
    pub failure: Option<String>,
    /// Everything observed on the session during this run.
    pub output: String,
}

/// Context handed to a handler when its transition fires.
pub struct StepContext<'a> {
    /// The dialogue label, for logging.
    pub label: &'a str,
    /// The state the machine was in when the pattern matched.
    pub state: i32,
    /// Stream text preceding the match.
    pub before: &'a str,
    /// The matched text.
    pub matched: &'a str,
    /// The per-run outcome, for recording results.
    pub outcome: &'a mut ExchangeOutcome,
    /// Progress reporting seam.
    pub sink: &'a dyn StatusSink,
}

/// Callback attached to a transition.
///
/// A handler may send data on the session (an interactive "yes"), start a
/// watch of a background operation, or fail the run. Handlers hold no
/// mutable state of their own; everything they learn goes into the
/// [`ExchangeOutcome`] on the step context.
#[async_trait]
pub trait DialogueHandler: Send + Sync {
    /// Invoked when the owning transition fires.
    async fn on_match(
        &self,
        session: &mut dyn SessionLine,
        step: StepContext<'_>,
    ) -> DialogueResult<HandlerVerdict>;
}

/// One row of a dialogue transition table.
#[derive(Clone)]
pub struct Transition {
    event: usize,
    valid_states: Vec<i32>,
    next_state: i32,
    handler: Option<Arc<dyn DialogueHandler>>,
    timeout: Duration,
    aborts: bool,
}

impl Transition {
    /// Creates an ordinary transition.
    ///
    /// `event` indexes the dialogue's pattern list; the transition fires
    /// when that pattern matches while the machine is in one of
    /// `valid_states`.
    pub fn new(
        event: usize,
        valid_states: &[i32],
        next_state: i32,
        handler: Option<Arc<dyn DialogueHandler>>,
        timeout: Duration,
    ) -> Self {
        Self {
            event,
            valid_states: valid_states.to_vec(),
            next_state,
            handler,
            timeout,
            aborts: false,
        }
    }

    /// Creates an aborting transition: the pattern drives the run to
    /// terminal failure from any state.
    pub fn abort(event: usize, timeout: Duration) -> Self {
        Self {
            event,
            valid_states: Vec::new(),
            next_state: TERMINAL_STATE,
            handler: None,
            timeout,
            aborts: true,
        }
    }
}

/// One multi-turn command exchange, constructed fresh per invocation.
pub struct Dialogue {
    label: String,
    command: String,
    events: Vec<Regex>,
    transitions: Vec<Transition>,
    timeout: Duration,
    max_steps: usize,
    sensitive: bool,
}

impl Dialogue {
    /// Creates a dialogue.
    ///
    /// `events` is the ordered pattern list; when several patterns could
    /// match the same text the earliest-declared wins, so generic patterns
    /// (a bare prompt) belong at the end. `timeout` bounds the first wait;
    /// later waits are bounded by the timeout of the transition just taken.
    pub fn new(
        label: impl Into<String>,
        command: impl Into<String>,
        events: Vec<Regex>,
        transitions: Vec<Transition>,
        timeout: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
            events,
            transitions,
            timeout,
            max_steps: DEFAULT_MAX_STEPS,
            sensitive: false,
        }
    }

    /// Overrides the transition-count ceiling.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Marks the command as sensitive: it is never written to the log.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Runs the dialogue to a terminal outcome.
    ///
    /// `Ok` carries the verdict (including failed verdicts: abort
    /// signature, failing handler, exhausted step budget); `Err` is
    /// reserved for protocol desync and session failures.
    pub async fn run(
        &self,
        session: &mut dyn SessionLine,
        sink: &dyn StatusSink,
    ) -> DialogueResult<ExchangeOutcome> {
        if self.sensitive {
            debug!(label = %self.label, "starting dialogue (command withheld from log)");
        } else {
            debug!(label = %self.label, command = %self.command, "starting dialogue");
        }

        let mut outcome = ExchangeOutcome::default();
        let mut state: i32 = 0;
        let mut wait = self.timeout;
        let mut first = true;

        for _ in 0..self.max_steps {
            let command = if first {
                Some(self.command.as_str())
            } else {
                None
            };
            first = false;

            let m = session.send_expect(command, &self.events, wait).await?;
            outcome.output.push_str(&m.before);
            outcome.output.push_str(&m.matched);

            // Abort signatures win over ordinary lookup in any state.
            if self
                .transitions
                .iter()
                .any(|t| t.aborts && t.event == m.index)
            {
                warn!(label = %self.label, "device aborted the operation");
                outcome.aborted = true;
                outcome.success = false;
                outcome.failure = Some("device aborted the operation".to_string());
                return Ok(outcome);
            }

            let transition = match self
                .transitions
                .iter()
                .find(|t| !t.aborts && t.event == m.index && t.valid_states.contains(&state))
            {
                Some(t) => t,
                None => {
                    let pattern = self.events[m.index].as_str().to_string();
                    return Err(DialogueError::ProtocolDesync {
                        pattern,
                        state,
                        output: outcome.output,
                    });
                }
            };

            if let Some(handler) = &transition.handler {
                let step = StepContext {
                    label: &self.label,
                    state,
                    before: &m.before,
                    matched: &m.matched,
                    outcome: &mut outcome,
                    sink,
                };
                match handler.on_match(session, step).await? {
                    HandlerVerdict::Proceed => {}
                    HandlerVerdict::Fail(reason) => {
                        warn!(label = %self.label, reason = %reason, "dialogue handler failed");
                        outcome.success = false;
                        outcome.failure = Some(reason);
                        return Ok(outcome);
                    }
                }
            }

            state = transition.next_state;
            if state == TERMINAL_STATE {
                outcome.success = true;
                return Ok(outcome);
            }
            wait = transition.timeout;
        }

        warn!(
            label = %self.label,
            max_steps = self.max_steps,
            "dialogue exceeded its transition budget"
        );
        outcome.success = false;
        outcome.failure = Some(format!(
            "exceeded {} transitions without reaching a terminal state",
            self.max_steps
        ));
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::session::{ExpectMatch, LogSink};
    use crate::SessionResult;

    /// Session fed from a queue of canned replies. Each wait consumes one
    /// reply and matches it against the registered patterns in order.
    struct FeedSession {
        replies: VecDeque<SessionResult<String>>,
        sent: Vec<String>,
        expect_calls: usize,
    }

    impl FeedSession {
        fn new(replies: Vec<SessionResult<String>>) -> Self {
            Self {
                replies: replies.into_iter().collect(),
                sent: Vec::new(),
                expect_calls: 0,
            }
        }
    }

    #[async_trait]
    impl SessionLine for FeedSession {
        async fn send(&mut self, command: &str, timeout: Duration) -> SessionResult<String> {
            self.sent.push(command.to_string());
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err(SessionError::timeout(command.to_string(), timeout)))
        }

        async fn send_expect(
            &mut self,
            command: Option<&str>,
            patterns: &[Regex],
            timeout: Duration,
        ) -> SessionResult<ExpectMatch> {
            self.expect_calls += 1;
            if let Some(command) = command {
                self.sent.push(command.to_string());
            }
            let text = match self.replies.pop_front() {
                Some(Ok(text)) => text,
                Some(Err(e)) => return Err(e),
                None => return Err(SessionError::timeout("pattern", timeout)),
            };
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

        async fn disconnect(&mut self) {}

        async fn reconnect(&mut self, _max_timeout: Duration) -> SessionResult<()> {
            Ok(())
        }
    }

    fn re(s: &str) -> Regex {
        Regex::new(s).unwrap()
    }

    const T: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_success_path() {
        let events = vec![re("finished successfully"), re("aborted")];
        let transitions = vec![
            Transition::new(0, &[0], TERMINAL_STATE, None, T),
            Transition::abort(1, T),
        ];
        let dialogue = Dialogue::new("commit", "install commit", events, transitions, T);

        let mut session = FeedSession::new(vec![Ok(
            "Install operation 5 finished successfully".to_string()
        )]);
        let outcome = dialogue.run(&mut session, &LogSink).await.unwrap();
        assert!(outcome.success);
        assert!(!outcome.aborted);
        assert_eq!(session.sent, vec!["install commit"]);
    }

    #[tokio::test]
    async fn test_abort_wins_regardless_of_table_order() {
        // The abort transition is declared last; the success transition is
        // the only one valid in state 0. Feeding the abort text must still
        // fail the run.
        let events = vec![re("finished successfully"), re("aborted")];
        let transitions = vec![
            Transition::new(0, &[0], TERMINAL_STATE, None, T),
            Transition::abort(1, T),
        ];
        let dialogue = Dialogue::new("add", "install add", events, transitions, T);

        let mut session =
            FeedSession::new(vec![Ok("Install operation 28 aborted".to_string())]);
        let outcome = dialogue.run(&mut session, &LogSink).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.aborted);
        assert!(outcome.output.contains("aborted"));
    }

    #[tokio::test]
    async fn test_step_budget_exhausted_after_exactly_max_steps() {
        let events = vec![re("tick")];
        // Self-loop with no reachable terminal state.
        let transitions = vec![Transition::new(0, &[0], 0, None, T)];
        let dialogue =
            Dialogue::new("loop", "poll", events, transitions, T).with_max_steps(5);

        let replies = (0..10).map(|_| Ok("tick".to_string())).collect();
        let mut session = FeedSession::new(replies);
        let outcome = dialogue.run(&mut session, &LogSink).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.failure.unwrap().contains("5 transitions"));
        assert_eq!(session.expect_calls, 5);
    }

    #[tokio::test]
    async fn test_protocol_desync_is_an_error() {
        let events = vec![re("STAGE 2")];
        // The pattern is only valid in state 1, but the machine starts in 0.
        let transitions = vec![Transition::new(0, &[1], TERMINAL_STATE, None, T)];
        let dialogue = Dialogue::new("issu", "issu run", events, transitions, T);

        let mut session = FeedSession::new(vec![Ok("STAGE 2: Restarting".to_string())]);
        let err = dialogue.run(&mut session, &LogSink).await.unwrap_err();
        match err {
            DialogueError::ProtocolDesync { state, output, .. } => {
                assert_eq!(state, 0);
                assert!(output.contains("STAGE 2"));
            }
            other => panic!("expected protocol desync, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_wait_timeout_propagates() {
        let events = vec![re("never")];
        let transitions = vec![Transition::new(0, &[0], TERMINAL_STATE, None, T)];
        let dialogue = Dialogue::new("add", "install add", events, transitions, T);

        let mut session = FeedSession::new(vec![Err(SessionError::timeout("pattern", T))]);
        let err = dialogue.run(&mut session, &LogSink).await.unwrap_err();
        assert!(matches!(
            err,
            DialogueError::Session(SessionError::Timeout { .. })
        ));
    }

    struct Confirm;

    #[async_trait]
    impl DialogueHandler for Confirm {
        async fn on_match(
            &self,
            session: &mut dyn SessionLine,
            _step: StepContext<'_>,
        ) -> DialogueResult<HandlerVerdict> {
            session.send("yes", T).await?;
            Ok(HandlerVerdict::Proceed)
        }
    }

    #[tokio::test]
    async fn test_handler_can_answer_a_prompt() {
        let events = vec![re("continue\\?"), re("finished successfully")];
        let transitions = vec![
            Transition::new(0, &[0], 1, Some(Arc::new(Confirm)), T),
            Transition::new(1, &[0, 1], TERMINAL_STATE, None, T),
        ];
        let dialogue = Dialogue::new("activate", "install activate", events, transitions, T);

        let mut session = FeedSession::new(vec![
            Ok("This operation will reload the sdr, continue?".to_string()),
            Ok("confirmed".to_string()), // reply to the handler's "yes"
            Ok("Install operation 7 finished successfully".to_string()),
        ]);
        let outcome = dialogue.run(&mut session, &LogSink).await.unwrap();
        assert!(outcome.success);
        assert_eq!(session.sent, vec!["install activate", "yes"]);
    }

    struct Veto;

    #[async_trait]
    impl DialogueHandler for Veto {
        async fn on_match(
            &self,
            _session: &mut dyn SessionLine,
            _step: StepContext<'_>,
        ) -> DialogueResult<HandlerVerdict> {
            Ok(HandlerVerdict::Fail("operation id not found".to_string()))
        }
    }

    #[tokio::test]
    async fn test_handler_failure_fails_the_run() {
        let events = vec![re("in the background")];
        let transitions = vec![Transition::new(
            0,
            &[0],
            TERMINAL_STATE,
            Some(Arc::new(Veto)),
            T,
        )];
        let dialogue = Dialogue::new("add", "install add", events, transitions, T);

        let mut session = FeedSession::new(vec![Ok(
            "Install operation will continue in the background".to_string(),
        )]);
        let outcome = dialogue.run(&mut session, &LogSink).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.failure.as_deref(), Some("operation id not found"));
    }
}
