//! Worker lifecycle shared by both queues: launch, send the request, read
//! messages until the task reaches a terminal state, then kill the worker.
use std::time::{Duration, Instant};

use tokio::sync::{oneshot, OwnedSemaphorePermit};

use super::traits::{WorkerLauncher, WorkerSession};
use super::types::{normalize_error_message, ScheduledTask, TaskState, Variant, WorkerMessage};
use crate::error::SchedulerError;
use crate::hub::ActionResponse;

pub(crate) type Outcome = Result<ActionResponse, SchedulerError>;

/// Single-use completion handle for the caller. The first settle wins;
/// later ones are dropped. An attached permit is released on settle.
pub(crate) struct Settle {
    tx: Option<oneshot::Sender<Outcome>>,
    permit: Option<OwnedSemaphorePermit>,
}

impl Settle {
    pub(crate) fn new(tx: oneshot::Sender<Outcome>) -> Self {
        Self {
            tx: Some(tx),
            permit: None,
        }
    }

    pub(crate) fn release_on_settle(mut self, permit: OwnedSemaphorePermit) -> Self {
        self.permit = Some(permit);
        self
    }

    pub(crate) fn settle(&mut self, outcome: Outcome) -> bool {
        let Some(tx) = self.tx.take() else {
            return false;
        };
        self.permit.take();
        // The caller may have gone away; the task still runs to completion.
        let _ = tx.send(outcome);
        true
    }
}

enum Event {
    Message(anyhow::Result<Option<WorkerMessage>>),
    Deadline,
}

/// Drives one task to a terminal state. Every path settles the caller and
/// kills the worker before returning.
pub(crate) async fn drive(
    launcher: &dyn WorkerLauncher,
    task: &mut ScheduledTask,
    timeout: Duration,
    settle: &mut Settle,
) -> TaskState {
    let mut session = match launcher.launch(task).await {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(
                task_id = task.id,
                webhook_id = %task.correlation_id,
                connector = %task.request.connector,
                error = %err,
                "failed to launch worker"
            );
            settle.settle(Err(SchedulerError::Spawn(err.to_string())));
            task.state = TaskState::Failed;
            return task.state;
        }
    };

    task.started_at = Some(Instant::now());
    task.state = TaskState::Spawned;
    tracing::info!(
        task_id = task.id,
        webhook_id = %task.correlation_id,
        variant = %task.variant,
        pid = ?session.pid(),
        queue_wait_ms = task.queue_wait_ms().unwrap_or(0),
        "worker spawned"
    );

    let deadline = tokio::time::Instant::now() + timeout;
    let state = run_session(session.as_mut(), task, timeout, deadline, settle).await;

    if let Err(err) = session.kill().await {
        tracing::warn!(task_id = task.id, error = %err, "failed to kill worker");
    }
    task.state = state;

    let elapsed_ms = task
        .started_at
        .map(|s| s.elapsed().as_millis() as u64)
        .unwrap_or(0);
    match state {
        TaskState::Succeeded => tracing::info!(
            task_id = task.id,
            webhook_id = %task.correlation_id,
            elapsed_ms,
            "worker finished"
        ),
        _ => tracing::warn!(
            task_id = task.id,
            webhook_id = %task.correlation_id,
            state = ?state,
            elapsed_ms,
            "worker ended abnormally"
        ),
    }
    state
}

async fn run_session(
    session: &mut dyn WorkerSession,
    task: &ScheduledTask,
    timeout: Duration,
    deadline: tokio::time::Instant,
    settle: &mut Settle,
) -> TaskState {
    let payload = match serde_json::to_string(&task.request) {
        Ok(p) => p,
        Err(err) => {
            settle.settle(Err(SchedulerError::Protocol(err.to_string())));
            return TaskState::Failed;
        }
    };
    if let Err(err) = session.send(&payload).await {
        settle.settle(Err(SchedulerError::Protocol(format!(
            "failed to send request: {err}"
        ))));
        return TaskState::Failed;
    }

    let mut responded = false;
    loop {
        let event = tokio::select! {
            msg = session.recv() => Event::Message(msg),
            _ = tokio::time::sleep_until(deadline) => Event::Deadline,
        };

        match event {
            Event::Deadline => {
                tracing::warn!(
                    task_id = task.id,
                    webhook_id = %task.correlation_id,
                    timeout_secs = timeout.as_secs(),
                    "killing worker due to timeout"
                );
                settle.settle(Err(SchedulerError::Timeout { after: timeout }));
                return TaskState::TimedOut;
            }
            Event::Message(Err(err)) => {
                settle.settle(Err(SchedulerError::Protocol(err.to_string())));
                return TaskState::Failed;
            }
            Event::Message(Ok(Some(WorkerMessage::Response { response }))) => {
                settle.settle(Ok(response));
                match task.variant {
                    Variant::Standard => return TaskState::Succeeded,
                    Variant::Extended => {
                        tracing::info!(
                            task_id = task.id,
                            webhook_id = %task.correlation_id,
                            "worker replied, waiting for completion"
                        );
                        responded = true;
                    }
                }
            }
            Event::Message(Ok(Some(WorkerMessage::Error { message }))) => {
                let message = normalize_error_message(&message);
                tracing::warn!(task_id = task.id, error = %message, "worker reported an error");
                settle.settle(Err(SchedulerError::Worker(message)));
                return TaskState::Failed;
            }
            Event::Message(Ok(Some(WorkerMessage::Done))) => match task.variant {
                Variant::Extended if responded => return TaskState::Succeeded,
                Variant::Extended => {
                    settle.settle(Err(SchedulerError::Protocol(
                        "worker finished without a response".to_string(),
                    )));
                    return TaskState::Failed;
                }
                Variant::Standard => {
                    settle.settle(Err(SchedulerError::Protocol(
                        "unexpected completion message from standard worker".to_string(),
                    )));
                    return TaskState::Failed;
                }
            },
            Event::Message(Ok(None)) => {
                let exit = match tokio::time::timeout_at(deadline, session.wait()).await {
                    Ok(Ok(exit)) => exit,
                    Ok(Err(err)) => {
                        tracing::warn!(task_id = task.id, error = %err, "failed to reap worker");
                        Default::default()
                    }
                    Err(_) => {
                        settle.settle(Err(SchedulerError::Timeout { after: timeout }));
                        return TaskState::TimedOut;
                    }
                };
                tracing::warn!(
                    task_id = task.id,
                    webhook_id = %task.correlation_id,
                    code = ?exit.code,
                    signal = ?exit.signal,
                    "worker disconnected"
                );
                settle.settle(Err(SchedulerError::Crash {
                    code: exit.code,
                    signal: exit.signal,
                }));
                return TaskState::Crashed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Semaphore;

    #[tokio::test]
    async fn first_settle_wins() {
        let (tx, rx) = oneshot::channel();
        let mut settle = Settle::new(tx);
        assert!(settle.settle(Ok(ActionResponse::ok_with_message("first"))));
        assert!(!settle.settle(Err(SchedulerError::QueueClosed)));
        let got = rx.await.unwrap().unwrap();
        assert_eq!(got.message.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn settle_releases_attached_permit() {
        let sem = Arc::new(Semaphore::new(1));
        let permit = sem.clone().acquire_owned().await.unwrap();
        let (tx, _rx) = oneshot::channel();
        let mut settle = Settle::new(tx).release_on_settle(permit);
        assert_eq!(sem.available_permits(), 0);
        settle.settle(Err(SchedulerError::QueueClosed));
        assert_eq!(sem.available_permits(), 1);
    }

    #[tokio::test]
    async fn settle_tolerates_dropped_caller() {
        let (tx, rx) = oneshot::channel();
        drop(rx);
        let mut settle = Settle::new(tx);
        assert!(settle.settle(Ok(ActionResponse::ok())));
    }
}
