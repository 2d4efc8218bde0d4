//! Base primitives for device install-operation orchestration.
//!
//! This crate provides the device-facing building blocks shared by every
//! install workflow:
//!
//! - [`SessionLine`]: the console text-channel contract (send a command,
//!   wait for one of N patterns, disconnect, reconnect)
//! - [`Dialogue`]: a generic state-machine executor for one multi-turn
//!   command/response exchange against a prompt-based stream
//! - [`watch_operation`] / [`wait_for_reload`]: polling of device-side
//!   background jobs across session loss and reconnect
//! - [`parse_show_platform`]: fixed-column node inventory parsing
//!
//! Everything here is transport-agnostic: the session implementation
//! (console/SSH/telnet) lives outside this workspace.

mod dialogue;
mod error;
mod inventory;
mod session;
mod watcher;

pub use dialogue::{
    Dialogue, DialogueError, DialogueHandler, DialogueResult, ExchangeOutcome, HandlerVerdict,
    StepContext, Transition, TERMINAL_STATE,
};
pub use error::{SessionError, SessionResult};
pub use inventory::{
    parse_show_platform, validate_node_states, NodeEntry, ACCEPTED_NODE_STATES,
};
pub use session::{
    ExpectMatch, LogSink, SessionLine, StatusSink, DEFAULT_COMMAND_TIMEOUT,
};
pub use watcher::{
    wait_for_reload, watch_operation, OperationHandle, ReconnectWindow, WatchError, WatchResult,
    ADMIN_SHOW_PLATFORM, NO_INSTALL_IN_PROGRESS, SHOW_INSTALL_REQUEST,
};
