//! instmgrd - install orchestration daemon front end.
//!
//! Parses the command line, builds the operation-unit registry and plans
//! phase dispatches for an install job. The console transport that backs
//! the session line is supplied by the deployment.

mod cli;

pub use cli::{build_registry, load_job, run, Cli, Command, JobArgs};
