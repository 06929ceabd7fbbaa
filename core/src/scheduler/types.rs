use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::hub::{ActionResponse, Job};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Standard,
    Extended,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Extended => "extended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "extended" => Some(Self::Extended),
            _ => None,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload written to a worker's stdin as a single JSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub connector: String,
    pub job: Job,
}

/// Messages a worker writes to stdout, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Response { response: ActionResponse },
    Error { message: String },
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Spawned,
    Succeeded,
    Failed,
    TimedOut,
    Crashed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued | Self::Spawned)
    }
}

/// One job's passage through a scheduler. Owned by the scheduler from
/// enqueue until its worker is gone.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub id: u64,
    pub correlation_id: String,
    pub variant: Variant,
    pub request: WorkerRequest,
    pub enqueued_at: Instant,
    pub started_at: Option<Instant>,
    pub state: TaskState,
}

impl ScheduledTask {
    pub fn new(id: u64, variant: Variant, request: WorkerRequest) -> Self {
        let correlation_id = request
            .job
            .webhook_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self {
            id,
            correlation_id,
            variant,
            request,
            enqueued_at: Instant::now(),
            started_at: None,
            state: TaskState::Queued,
        }
    }

    pub fn queue_wait_ms(&self) -> Option<u64> {
        self.started_at
            .map(|s| s.duration_since(self.enqueued_at).as_millis() as u64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl WorkerExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Human-readable error text for a failed worker. Blank or structurally
/// empty messages collapse to a fixed placeholder.
pub fn normalize_error_message(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() || trimmed == "{}" || trimmed == "[]" {
        "Unnamed Error".to_string()
    } else {
        trimmed.to_string()
    }
}
