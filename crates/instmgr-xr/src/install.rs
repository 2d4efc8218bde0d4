//! Shared install-operation helpers.
//!
//! Every install command speaks the same dialect: the device either
//! accepts the operation into the background, continues it asynchronously,
//! warns that it will reload, asks for confirmation, reports a no-impact
//! operation, or aborts. [`install_dialogue`] captures that dialect as one
//! dialogue table; the handlers watch accepted operations to completion
//! and cross the reload barrier when the device reboots underneath them.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use instmgr_common::{
    wait_for_reload, watch_operation, Dialogue, DialogueHandler, DialogueResult, ExchangeOutcome,
    HandlerVerdict, OperationHandle, ReconnectWindow, SessionLine, StatusSink, StepContext,
    Transition, WatchError, DEFAULT_COMMAND_TIMEOUT, NO_INSTALL_IN_PROGRESS,
    SHOW_INSTALL_REQUEST, TERMINAL_STATE,
};
use instmgr_core::{InstallContext, Platform, TaskError, TaskResult};

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Invalid regex pattern")
}

static ABORTED_RE: Lazy<Regex> = Lazy::new(|| re("aborted"));
static CONTINUE_IN_BACKGROUND_RE: Lazy<Regex> =
    Lazy::new(|| re("Install operation will continue in the background"));
static ASYNC_CONTINUE_RE: Lazy<Regex> =
    Lazy::new(|| re("The install operation will continue asynchronously"));
static REBOOT_PROMPT_RE: Lazy<Regex> =
    Lazy::new(|| re("This install operation will (?:reboot|reload) the sdr, continue"));
static NO_IMPACT_RE: Lazy<Regex> = Lazy::new(|| re("NO IMPACT OPERATION"));
static PREPARE_CLEAN_RE: Lazy<Regex> =
    Lazy::new(|| re("will clean the prepared packages, continue"));
static ISSU_PROMPT_RE: Lazy<Regex> = Lazy::new(|| re("start the issu, continue"));
static PROCEED_RE: Lazy<Regex> = Lazy::new(|| re("Do you want to proceed"));
static CONFIRM_RE: Lazy<Regex> = Lazy::new(|| re("to continue"));
static RUN_PROMPT_RE: Lazy<Regex> = Lazy::new(|| re("#"));
static PASSWORD_RE: Lazy<Regex> = Lazy::new(|| re("[Pp]assword:"));

static OPERATION_ID_RE: Lazy<Regex> = Lazy::new(|| re(r"Install operation (\d+)"));
static INSTALL_ERROR_RE: Lazy<Regex> = Lazy::new(|| re(r"(?m)Error:    (.*)$"));
static INSTALL_METHOD_RE: Lazy<Regex> = Lazy::new(|| re(r"Install [Mm]ethod: (.*)"));
static OPERATION_FAILED_RE: Lazy<Regex> = Lazy::new(|| re(r"Install operation (\d+) failed"));
static COMPLETED_WITH_FAILURE_RE: Lazy<Regex> =
    Lazy::new(|| re(r"Install operation (\d+) completed with failure"));
static COMPLETED_SUCCESS_RE: Lazy<Regex> =
    Lazy::new(|| re(r"Install operation (\d+) completed successfully"));
static INCREMENTAL_PARALLEL_RE: Lazy<Regex> = Lazy::new(|| re(r"incremental.*parallel"));

// Event indices of the shared install dialogue. The generic run prompt is
// deliberately last: the most specific pattern must win when several could
// match the same text.
const EV_BACKGROUND: usize = 0;
const EV_ASYNC: usize = 1;
const EV_REBOOT: usize = 2;
const EV_NO_IMPACT: usize = 3;
const EV_PREPARE_CLEAN: usize = 4;
const EV_ISSU: usize = 5;
const EV_PROCEED: usize = 6;
const EV_CONFIRM: usize = 7;
const EV_ABORTED: usize = 8;
const EV_PROMPT: usize = 9;

const INSTALL_DIALOGUE_TIMEOUT: Duration = Duration::from_secs(7200);
const BACKGROUND_TIMEOUT: Duration = Duration::from_secs(100);
const ASYNC_TIMEOUT: Duration = Duration::from_secs(7200);
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(100);
const NO_IMPACT_TIMEOUT: Duration = Duration::from_secs(20);
const CONFIRM_ANSWER_TIMEOUT: Duration = Duration::from_secs(30);
const PASSWORD_PROMPT_TIMEOUT: Duration = Duration::from_secs(60);
const LOG_TIMEOUT: Duration = Duration::from_secs(120);

/// Extracts the device-issued operation id from command output.
pub(crate) fn extract_operation_id(output: &str) -> Option<String> {
    OPERATION_ID_RE
        .captures(output)
        .map(|c| c[1].to_string())
}

/// Logs every `Error:` line of an install log or command output.
pub(crate) fn log_install_errors(output: &str) {
    for c in INSTALL_ERROR_RE.captures_iter(output) {
        warn!(error = &c[1], "install error");
    }
}

/// Joins the packages with an acceptable file extension for the family
/// and reports whether a tar bundle is among them.
pub(crate) fn filter_packages(family: Platform, packages: &[String]) -> (String, bool) {
    let accepted: &[&str] = if family == Platform::Ncs6k {
        &["iso", "pkg", "smu", "tar"]
    } else {
        &["rpm", "iso", "tar"]
    };
    let selected: Vec<&str> = packages
        .iter()
        .map(String::as_str)
        .filter(|p| accepted.iter().any(|ext| p.contains(ext)))
        .collect();
    let joined = selected.join(" ");
    let has_tar = joined.contains("tar");
    (joined, has_tar)
}

/// Handler for operations that complete without a reload: extract the
/// operation id and watch it to completion.
struct NonReloadHandler;

#[async_trait::async_trait]
impl DialogueHandler for NonReloadHandler {
    async fn on_match(
        &self,
        session: &mut dyn SessionLine,
        step: StepContext<'_>,
    ) -> DialogueResult<HandlerVerdict> {
        let Some(op_id) = extract_operation_id(step.before) else {
            return Ok(HandlerVerdict::Fail(format!(
                "operation id not found in output: {}",
                step.before
            )));
        };
        let mut handle = OperationHandle::new(op_id.clone(), step.label);
        match watch_operation(session, &mut handle, step.sink).await {
            Ok(output) => {
                step.outcome.operation_id = Some(op_id);
                step.outcome.output.push_str(&output);
                Ok(HandlerVerdict::Proceed)
            }
            Err(e) => Ok(HandlerVerdict::Fail(format!(
                "watch of operation {op_id} failed: {e}"
            ))),
        }
    }
}

/// Handler for the reboot path: watch the operation (tolerating the watch
/// dying because the device already started rebooting), then hold the
/// reload barrier until every node stabilizes.
struct ReloadHandler {
    window: ReconnectWindow,
}

#[async_trait::async_trait]
impl DialogueHandler for ReloadHandler {
    async fn on_match(
        &self,
        session: &mut dyn SessionLine,
        step: StepContext<'_>,
    ) -> DialogueResult<HandlerVerdict> {
        let Some(op_id) = extract_operation_id(step.before) else {
            return Ok(HandlerVerdict::Fail(format!(
                "operation id not found in output: {}",
                step.before
            )));
        };
        let mut handle = OperationHandle::new(op_id.clone(), step.label).with_expected_reload();
        match watch_operation(session, &mut handle, step.sink).await {
            Ok(output) => step.outcome.output.push_str(&output),
            // The device already started the reload.
            Err(WatchError::Session(e)) if e.is_timeout() => {}
            Err(e) => {
                return Ok(HandlerVerdict::Fail(format!(
                    "watch of operation {op_id} failed: {e}"
                )))
            }
        }
        match wait_for_reload(session, &self.window, step.sink).await {
            Ok(()) => {
                info!(operation = %op_id, "operation finished successfully after reload");
                step.outcome.operation_id = Some(op_id);
                step.outcome.reload_performed = true;
                Ok(HandlerVerdict::Proceed)
            }
            Err(e) => Ok(HandlerVerdict::Fail(e.to_string())),
        }
    }
}

/// Handler for interactive confirmation prompts: answer "yes" and, when an
/// operation id is already visible, watch it to completion.
struct ConfirmHandler;

#[async_trait::async_trait]
impl DialogueHandler for ConfirmHandler {
    async fn on_match(
        &self,
        session: &mut dyn SessionLine,
        step: StepContext<'_>,
    ) -> DialogueResult<HandlerVerdict> {
        session.send("yes", CONFIRM_ANSWER_TIMEOUT).await?;
        if let Some(op_id) = extract_operation_id(step.before) {
            let mut handle = OperationHandle::new(op_id.clone(), step.label);
            match watch_operation(session, &mut handle, step.sink).await {
                Ok(output) => {
                    step.outcome.operation_id = Some(op_id);
                    step.outcome.output.push_str(&output);
                }
                Err(e) => {
                    return Ok(HandlerVerdict::Fail(format!(
                        "watch of operation {op_id} failed: {e}"
                    )))
                }
            }
        }
        Ok(HandlerVerdict::Proceed)
    }
}

/// Handler for the no-impact outcome: the packages are already in the
/// requested state.
struct NoImpactHandler;

#[async_trait::async_trait]
impl DialogueHandler for NoImpactHandler {
    async fn on_match(
        &self,
        _session: &mut dyn SessionLine,
        step: StepContext<'_>,
    ) -> DialogueResult<HandlerVerdict> {
        warn!("this was a NO IMPACT OPERATION, packages are already active on the device");
        step.outcome.no_impact = true;
        Ok(HandlerVerdict::Proceed)
    }
}

/// Handler for the asynchronous-continuation dialect: watch the operation,
/// then verify the install log and follow the reported install method
/// (which may require a reload barrier).
struct AsyncWatchHandler {
    command: String,
    window: ReconnectWindow,
}

#[async_trait::async_trait]
impl DialogueHandler for AsyncWatchHandler {
    async fn on_match(
        &self,
        session: &mut dyn SessionLine,
        step: StepContext<'_>,
    ) -> DialogueResult<HandlerVerdict> {
        let Some(op_id) = extract_operation_id(step.before) else {
            log_install_errors(step.before);
            return Ok(HandlerVerdict::Fail(format!(
                "operation id not found in output: {}",
                step.before
            )));
        };
        match watch_and_verify(session, step.sink, &op_id, &self.command, &self.window).await {
            Ok(reloaded) => {
                step.outcome.operation_id = Some(op_id);
                step.outcome.reload_performed = reloaded;
                Ok(HandlerVerdict::Proceed)
            }
            Err(e) => Ok(HandlerVerdict::Fail(e.to_string())),
        }
    }
}

/// Watches an operation, inspects its install log, retries once with the
/// parallel-reload option when the log shows the incremental/parallel
/// failure, and follows the reported install method. Returns whether a
/// reload barrier was crossed.
async fn watch_and_verify(
    session: &mut dyn SessionLine,
    sink: &dyn StatusSink,
    op_id: &str,
    command: &str,
    window: &ReconnectWindow,
) -> TaskResult<bool> {
    let mut op_id = op_id.to_string();
    let mut handle = OperationHandle::new(op_id.clone(), command);
    watch_operation(session, &mut handle, sink).await?;

    let mut output = session
        .send(&format!("admin show install log {op_id} detail"), LOG_TIMEOUT)
        .await?;

    if OPERATION_FAILED_RE.is_match(&output) {
        if INCREMENTAL_PARALLEL_RE.is_match(&output) {
            info!("retrying with the parallel reload option");
            let retry_cmd = format!("{command} parallel-reload");
            let retry_output = session.send(&retry_cmd, ASYNC_TIMEOUT).await?;
            if !ASYNC_CONTINUE_RE.is_match(&retry_output) {
                log_install_errors(&retry_output);
                return Err(TaskError::operation(
                    format!("operation {op_id} failed"),
                    retry_output,
                ));
            }
            match extract_operation_id(&retry_output) {
                Some(new_id) => {
                    op_id = new_id;
                    let mut handle = OperationHandle::new(op_id.clone(), retry_cmd);
                    watch_operation(session, &mut handle, sink).await?;
                    output = session
                        .send(&format!("admin show install log {op_id} detail"), LOG_TIMEOUT)
                        .await?;
                }
                None => {
                    log_install_errors(&retry_output);
                    return Err(TaskError::operation("operation id not found", retry_output));
                }
            }
        } else {
            log_install_errors(&output);
            return Err(TaskError::operation(
                format!("operation {op_id} failed"),
                output,
            ));
        }
    }

    let Some(c) = INSTALL_METHOD_RE.captures(&output) else {
        log_install_errors(&output);
        return Err(TaskError::operation("install method not reported", output));
    };
    let method = c[1].trim().to_string();
    info!(method = %method, "pending restart");
    match method.as_str() {
        "Parallel Reload" => {
            if COMPLETED_WITH_FAILURE_RE.is_match(&output) {
                info!("install completed with failure, going for reload");
            } else if COMPLETED_SUCCESS_RE.is_match(&output) {
                info!("install completed successfully, going for reload");
            }
            wait_for_reload(session, window, sink).await?;
            Ok(true)
        }
        "Parallel Process Restart" => Ok(false),
        other => Err(TaskError::operation(
            format!("unexpected install method '{other}'"),
            output,
        )),
    }
}

/// Builds the shared install dialogue for `command`.
fn install_dialogue(label: &str, command: &str, window: &ReconnectWindow) -> Dialogue {
    let events = vec![
        CONTINUE_IN_BACKGROUND_RE.clone(),
        ASYNC_CONTINUE_RE.clone(),
        REBOOT_PROMPT_RE.clone(),
        NO_IMPACT_RE.clone(),
        PREPARE_CLEAN_RE.clone(),
        ISSU_PROMPT_RE.clone(),
        PROCEED_RE.clone(),
        CONFIRM_RE.clone(),
        ABORTED_RE.clone(),
        RUN_PROMPT_RE.clone(),
    ];
    let transitions = vec![
        Transition::new(
            EV_BACKGROUND,
            &[0],
            TERMINAL_STATE,
            Some(Arc::new(NonReloadHandler)),
            BACKGROUND_TIMEOUT,
        ),
        Transition::new(
            EV_ASYNC,
            &[0],
            TERMINAL_STATE,
            Some(Arc::new(AsyncWatchHandler {
                command: command.to_string(),
                window: window.clone(),
            })),
            ASYNC_TIMEOUT,
        ),
        Transition::new(
            EV_REBOOT,
            &[0],
            TERMINAL_STATE,
            Some(Arc::new(ReloadHandler {
                window: window.clone(),
            })),
            CONFIRM_TIMEOUT,
        ),
        Transition::new(
            EV_NO_IMPACT,
            &[0],
            TERMINAL_STATE,
            Some(Arc::new(NoImpactHandler)),
            NO_IMPACT_TIMEOUT,
        ),
        Transition::new(
            EV_PREPARE_CLEAN,
            &[0],
            TERMINAL_STATE,
            Some(Arc::new(ConfirmHandler)),
            CONFIRM_TIMEOUT,
        ),
        Transition::new(
            EV_ISSU,
            &[0],
            TERMINAL_STATE,
            Some(Arc::new(ConfirmHandler)),
            CONFIRM_TIMEOUT,
        ),
        Transition::new(
            EV_PROCEED,
            &[0],
            TERMINAL_STATE,
            Some(Arc::new(ConfirmHandler)),
            CONFIRM_TIMEOUT,
        ),
        Transition::new(
            EV_CONFIRM,
            &[0],
            TERMINAL_STATE,
            Some(Arc::new(ConfirmHandler)),
            CONFIRM_TIMEOUT,
        ),
        Transition::abort(EV_ABORTED, CONFIRM_TIMEOUT),
        Transition::new(
            EV_PROMPT,
            &[0],
            TERMINAL_STATE,
            Some(Arc::new(NonReloadHandler)),
            BACKGROUND_TIMEOUT,
        ),
    ];
    Dialogue::new(label, command, events, transitions, INSTALL_DIALOGUE_TIMEOUT)
}

/// Turns a finished dialogue into a task result, surfacing the raw output
/// on every failure path.
fn settle(outcome: ExchangeOutcome) -> TaskResult<ExchangeOutcome> {
    if outcome.aborted {
        log_install_errors(&outcome.output);
        return Err(TaskError::aborted(outcome.output));
    }
    if !outcome.success {
        let reason = outcome
            .failure
            .clone()
            .unwrap_or_else(|| "install dialogue failed".to_string());
        log_install_errors(&outcome.output);
        return Err(TaskError::operation(reason, outcome.output));
    }
    Ok(outcome)
}

/// Runs an install command through the shared dialogue.
pub(crate) async fn execute_install(
    ctx: &mut InstallContext,
    label: &str,
    command: &str,
    window: &ReconnectWindow,
) -> TaskResult<ExchangeOutcome> {
    let dialogue = install_dialogue(label, command, window);
    let (session, sink) = ctx.session_and_sink();
    settle(dialogue.run(session, sink).await?)
}

/// Runs an install command that prompts for a repository password.
///
/// The command (already stripped of the password) is sent first; once the
/// password prompt appears, the secret is fed through a dialogue marked
/// sensitive so it never reaches the log.
pub(crate) async fn execute_install_with_password(
    ctx: &mut InstallContext,
    label: &str,
    command: &str,
    password: &str,
    window: &ReconnectWindow,
) -> TaskResult<ExchangeOutcome> {
    let (session, sink) = ctx.session_and_sink();
    session
        .send_expect(
            Some(command),
            std::slice::from_ref(&*PASSWORD_RE),
            PASSWORD_PROMPT_TIMEOUT,
        )
        .await?;
    let dialogue = install_dialogue(label, password, window).sensitive();
    settle(dialogue.run(session, sink).await?)
}

/// Fails when the operation's install log records it as aborted.
pub(crate) async fn verify_operation_log(
    ctx: &mut InstallContext,
    op_id: &str,
) -> TaskResult<String> {
    let output = ctx
        .send(&format!("show install log {op_id} detail"), LOG_TIMEOUT)
        .await?;
    let aborted = format!("Install operation {op_id} aborted");
    if output.contains(&aborted) {
        log_install_errors(&output);
        return Err(TaskError::operation(
            format!("operation {op_id} failed"),
            output,
        ));
    }
    Ok(output)
}

/// Captures the active/inactive/committed package listings into the job
/// outcome.
pub(crate) async fn refresh_package_snapshot(ctx: &mut InstallContext) -> TaskResult<()> {
    let active = ctx
        .send("show install active", DEFAULT_COMMAND_TIMEOUT)
        .await?;
    let inactive = ctx
        .send("show install inactive", DEFAULT_COMMAND_TIMEOUT)
        .await?;
    let committed = ctx
        .send("show install committed", DEFAULT_COMMAND_TIMEOUT)
        .await?;
    ctx.outcome.active_packages = Some(active);
    ctx.outcome.inactive_packages = Some(inactive);
    ctx.outcome.committed_packages = Some(committed);
    Ok(())
}

/// Fails when the device reports an install operation already in progress.
pub(crate) async fn ensure_no_operation_in_progress(
    ctx: &mut InstallContext,
) -> TaskResult<()> {
    let output = ctx
        .send(SHOW_INSTALL_REQUEST, DEFAULT_COMMAND_TIMEOUT)
        .await?;
    if output.contains(NO_INSTALL_IN_PROGRESS) {
        Ok(())
    } else {
        Err(TaskError::operation(
            "another install operation is in progress",
            output,
        ))
    }
}

/// Reads the name of the package added by `op_id` from its install log.
///
/// Assumes a single package was added, as the sequenced upgrade flows do.
pub(crate) async fn added_package_name(
    ctx: &mut InstallContext,
    op_id: &str,
) -> TaskResult<String> {
    let output = ctx
        .send(&format!("show install log {op_id}"), LOG_TIMEOUT)
        .await?;
    let lines: Vec<&str> = output.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        if line.contains("Packages added:") {
            if let Some(name) = lines.get(idx + 1).and_then(|l| l.split_whitespace().last()) {
                return Ok(name.to_string());
            }
        }
    }
    Err(TaskError::operation(
        "added package name not found in the install log",
        output,
    ))
}

/// Reads the names of the packages extracted by `op_id` from its install
/// log. The administrative plane spells the marker differently.
pub(crate) async fn extracted_package_names(
    ctx: &mut InstallContext,
    op_id: &str,
    admin_mode: bool,
) -> TaskResult<String> {
    let output = ctx
        .send(&format!("show install log {op_id}"), LOG_TIMEOUT)
        .await?;
    let marker = if admin_mode {
        "Extracted package :"
    } else {
        "Extracted Package:"
    };
    let names: Vec<String> = output
        .lines()
        .filter(|line| line.contains(marker))
        .filter_map(|line| line.rsplit(':').next())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        return Err(TaskError::operation(
            "no extracted package reported in the install log",
            output,
        ));
    }
    Ok(names.join(" "))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_extract_operation_id() {
        let output = "May 24 18:54:12 Install operation 12 started by root:\n\
                      install add source tftp://223.255.254.254/images ncs6k-mpls.pkg-6.1.0";
        assert_eq!(extract_operation_id(output).as_deref(), Some("12"));
        assert_eq!(extract_operation_id("no operation here"), None);
    }

    #[test]
    fn test_filter_packages_per_family() {
        let packages = vec![
            "ncs6k-mpls.pkg-6.1.0".to_string(),
            "ncs6k-mini-x.iso-6.1.0".to_string(),
            "readme.txt".to_string(),
            "bundle.tar".to_string(),
        ];
        let (joined, has_tar) = filter_packages(Platform::Ncs6k, &packages);
        assert!(joined.contains("mpls.pkg"));
        assert!(joined.contains("iso"));
        assert!(!joined.contains("readme"));
        assert!(has_tar);

        let packages = vec![
            "asr9k-mcast-x64-2.0.0.0-r61116I.x86_64.rpm".to_string(),
            "ncs6k-mpls.pkg-6.1.0".to_string(),
        ];
        let (joined, has_tar) = filter_packages(Platform::Asr9k, &packages);
        // The pkg extension is only acceptable on NCS6K.
        assert_eq!(joined, "asr9k-mcast-x64-2.0.0.0-r61116I.x86_64.rpm");
        assert!(!has_tar);
    }

    #[test]
    fn test_install_error_scrape_pattern() {
        let output = "\
May 23 22:57:48 Error:    Cannot proceed with the operation\n\
May 23 22:57:48 Error:    Package is superseded\n";
        let errors: Vec<&str> = INSTALL_ERROR_RE
            .captures_iter(output)
            .map(|c| c.get(1).unwrap().as_str())
            .collect();
        assert_eq!(
            errors,
            vec!["Cannot proceed with the operation", "Package is superseded"]
        );
    }

    #[test]
    fn test_install_method_pattern() {
        let output = "Install Method: Parallel Reload\n";
        let method = INSTALL_METHOD_RE
            .captures(output)
            .map(|c| c[1].trim().to_string());
        assert_eq!(method.as_deref(), Some("Parallel Reload"));
    }

    #[test]
    fn test_dialogue_event_order_puts_generic_prompt_last() {
        // "to continue" also occurs inside the reboot prompt, and "#"
        // occurs in almost any output: the specific patterns must be
        // declared first so they win.
        let reboot = "This install operation will reload the sdr, continue";
        assert!(REBOOT_PROMPT_RE.is_match(reboot));
        assert!(CONFIRM_RE.is_match(reboot));
        assert!(EV_REBOOT < EV_CONFIRM);
        assert!(EV_CONFIRM < EV_PROMPT);
        assert!(RUN_PROMPT_RE.is_match("RP/0/RP0/CPU0:Deploy#"));
    }
}
