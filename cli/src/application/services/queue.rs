//! Application service: queue submission and status polling.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use rediacc_common::{ApiResponse, QueueStatus};
use serde::Serialize;
use serde_json::{Map, json};
use tokio::time::Instant;
use tracing::debug;

use crate::application::ports::{ApiCaller, ProgressReporter};
use crate::domain::error::ClientError;
use crate::domain::queue::{
    CompletionResult, PollOptions, SubmitOptions, SubmitRequest, extract_status, extract_task_id,
};

const CREATE_ENDPOINT: &str = "CreateQueueItem";
const TRACE_ENDPOINT: &str = "GetQueueItemTrace";

/// Submits `request` and returns the new task id.
///
/// # Errors
///
/// Any gateway failure, or [`ClientError::MalformedResponse`] when the
/// response carries no task id.
pub async fn submit(api: &impl ApiCaller, request: &SubmitRequest) -> Result<String, ClientError> {
    let response = api.call(CREATE_ENDPOINT, request.params()).await?;
    let task_id = extract_task_id(&response)?;
    debug!(task_id, machine = %request.machine, "queue item created");
    Ok(task_id)
}

async fn fetch_trace(api: &impl ApiCaller, task_id: &str) -> Result<ApiResponse, ClientError> {
    let mut params = Map::new();
    params.insert("taskId".into(), json!(task_id));
    api.call(TRACE_ENDPOINT, params).await
}

/// One status check without waiting.
///
/// `completed` is `true` when the task is already in a final state.
///
/// # Errors
///
/// Any gateway failure, or [`ClientError::MalformedResponse`] when the trace
/// carries no status.
pub async fn trace(api: &impl ApiCaller, task_id: &str) -> Result<CompletionResult, ClientError> {
    let response = fetch_trace(api, task_id).await?;
    let status = extract_status(&response)
        .ok_or_else(|| ClientError::MalformedResponse("trace has no status".into()))?;
    let mut result = CompletionResult::terminal(task_id, status, &response);
    result.completed = result.status.is_terminal();
    Ok(result)
}

/// Polls until the task reaches a final state or `opts.timeout` elapses.
///
/// The first poll is immediate. Transient failures (network, lock
/// contention, 5xx) are logged and retried on the next tick; anything else
/// ends polling with the error. A timeout is not an error: the result has
/// status `TIMEOUT` and `completed == false`.
///
/// # Errors
///
/// Non-transient gateway failures, including [`ClientError::Unauthenticated`].
pub async fn poll_until_terminal(
    api: &impl ApiCaller,
    task_id: &str,
    opts: &PollOptions,
    reporter: &impl ProgressReporter,
) -> Result<CompletionResult, ClientError> {
    let deadline = Instant::now() + opts.timeout;
    let mut last: Option<QueueStatus> = None;

    loop {
        match fetch_trace(api, task_id).await {
            Ok(response) => match extract_status(&response) {
                Some(status) if status.is_terminal() => {
                    debug!(task_id, %status, "task finished");
                    return Ok(CompletionResult::terminal(task_id, status, &response));
                }
                Some(status) => {
                    if last.as_ref() != Some(&status) {
                        reporter.step(&format!("task {task_id}: {status}"));
                        last = Some(status);
                    }
                }
                None => debug!(task_id, "trace has no status yet"),
            },
            Err(e) if e.is_transient() => debug!(task_id, "poll failed, retrying: {e}"),
            Err(e) => return Err(e),
        }

        let now = Instant::now();
        if now >= deadline {
            debug!(task_id, "polling timed out");
            return Ok(CompletionResult::timed_out(task_id));
        }
        tokio::time::sleep(opts.interval.min(deadline - now)).await;
    }
}

/// Outcome of [`submit_and_wait`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitOutcome {
    pub task_id: String,
    /// Present only when waiting was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionResult>,
    /// `command_output` of a finished task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Submits `request` and, when `opts.wait` is set, polls it to completion.
///
/// # Errors
///
/// Submission failures and non-transient polling failures.
pub async fn submit_and_wait(
    api: &impl ApiCaller,
    request: &SubmitRequest,
    opts: &SubmitOptions,
    reporter: &impl ProgressReporter,
) -> Result<SubmitOutcome, ClientError> {
    let task_id = submit(api, request).await?;
    reporter.success(&format!("queued task {task_id}"));
    if !opts.wait {
        return Ok(SubmitOutcome {
            task_id,
            completion: None,
            output: None,
        });
    }

    let completion = poll_until_terminal(api, &task_id, &opts.poll(), reporter).await?;
    match &completion.status {
        QueueStatus::Timeout => reporter.warn(&format!(
            "task {task_id} still running after {}s",
            opts.timeout.as_secs()
        )),
        s if s.is_success() => reporter.success(&format!("task {task_id} completed")),
        s => reporter.warn(&format!("task {task_id} ended with {s}")),
    }
    let output = completion.command_output();
    Ok(SubmitOutcome {
        task_id,
        completion: Some(completion),
        output,
    })
}
