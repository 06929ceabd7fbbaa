#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use action_hub_core::error::SinkError;
use action_hub_core::hub::ActionResponse;
use action_hub_core::ingest::{BatchSink, RecordBatch};
use action_hub_core::scheduler::{
    ScheduledTask, WorkerExit, WorkerLauncher, WorkerMessage, WorkerSession,
};
use async_trait::async_trait;
use tokio::time::Instant;

/// Scripted behaviour of a fake worker.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(Duration, ActionResponse),
    Fail(Duration, String),
    Done(Duration),
    /// Close the output and exit with the given code.
    Exit(Duration, i32),
    Hang,
}

type Script = dyn Fn(&ScheduledTask) -> Vec<Step> + Send + Sync;

#[derive(Default)]
pub struct Counters {
    pub launched: AtomicUsize,
    pub alive: AtomicUsize,
    pub peak: AtomicUsize,
    pub killed: AtomicUsize,
}

/// In-memory launcher standing in for real worker processes.
pub struct FakeLauncher {
    script: Box<Script>,
    fail_spawn: bool,
    pub counters: Arc<Counters>,
    pub launches: Mutex<Vec<(String, Instant)>>,
    pub payloads: Arc<Mutex<Vec<String>>>,
}

impl FakeLauncher {
    pub fn new(script: impl Fn(&ScheduledTask) -> Vec<Step> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            fail_spawn: false,
            counters: Arc::new(Counters::default()),
            launches: Mutex::new(Vec::new()),
            payloads: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(|_| Vec::new()),
            fail_spawn: true,
            counters: Arc::new(Counters::default()),
            launches: Mutex::new(Vec::new()),
            payloads: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn launched(&self) -> usize {
        self.counters.launched.load(Ordering::SeqCst)
    }

    pub fn alive(&self) -> usize {
        self.counters.alive.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    pub fn killed(&self) -> usize {
        self.counters.killed.load(Ordering::SeqCst)
    }

    pub fn launch_time(&self, correlation_id: &str) -> Option<Instant> {
        self.launches
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == correlation_id)
            .map(|(_, t)| *t)
    }
}

#[async_trait]
impl WorkerLauncher for FakeLauncher {
    fn name(&self) -> &str {
        "fake"
    }

    async fn launch(&self, task: &ScheduledTask) -> anyhow::Result<Box<dyn WorkerSession>> {
        if self.fail_spawn {
            anyhow::bail!("no such executable");
        }
        self.counters.launched.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.alive.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);
        self.launches
            .lock()
            .unwrap()
            .push((task.correlation_id.clone(), Instant::now()));

        Ok(Box::new(FakeSession {
            steps: (self.script)(task).into(),
            counters: Arc::clone(&self.counters),
            payloads: Arc::clone(&self.payloads),
            exit_code: None,
            killed: false,
        }))
    }
}

struct FakeSession {
    steps: VecDeque<Step>,
    counters: Arc<Counters>,
    payloads: Arc<Mutex<Vec<String>>>,
    exit_code: Option<i32>,
    killed: bool,
}

#[async_trait]
impl WorkerSession for FakeSession {
    fn pid(&self) -> Option<u32> {
        None
    }

    async fn send(&mut self, payload: &str) -> anyhow::Result<()> {
        self.payloads.lock().unwrap().push(payload.to_string());
        Ok(())
    }

    async fn recv(&mut self) -> anyhow::Result<Option<WorkerMessage>> {
        match self.steps.pop_front() {
            Some(Step::Reply(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(Some(WorkerMessage::Response { response }))
            }
            Some(Step::Fail(delay, message)) => {
                tokio::time::sleep(delay).await;
                Ok(Some(WorkerMessage::Error { message }))
            }
            Some(Step::Done(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(Some(WorkerMessage::Done))
            }
            Some(Step::Exit(delay, code)) => {
                tokio::time::sleep(delay).await;
                self.exit_code = Some(code);
                Ok(None)
            }
            Some(Step::Hang) | None => std::future::pending().await,
        }
    }

    async fn wait(&mut self) -> anyhow::Result<WorkerExit> {
        Ok(WorkerExit {
            code: self.exit_code,
            signal: None,
        })
    }

    async fn kill(&mut self) -> anyhow::Result<()> {
        if !self.killed {
            self.killed = true;
            self.counters.alive.fetch_sub(1, Ordering::SeqCst);
            self.counters.killed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Polls until `cond` holds, letting spawned tasks make progress.
pub async fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    cond()
}

pub fn reply(ms: u64, message: &str) -> Step {
    Step::Reply(
        Duration::from_millis(ms),
        ActionResponse::ok_with_message(message),
    )
}

/// Sink that records every batch and can fail chosen sequence numbers.
#[derive(Default)]
pub struct RecordingSink {
    pub batches: Mutex<Vec<RecordBatch>>,
    pub attempts: Mutex<Vec<(u64, Instant)>>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    failures: Mutex<Vec<(u64, u32, u16)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail batch `seq` `times` times with `status` before accepting it.
    pub fn fail(&self, seq: u64, times: u32, status: u16) {
        self.failures.lock().unwrap().push((seq, times, status));
    }

    pub fn sequences(&self) -> Vec<u64> {
        self.batches.lock().unwrap().iter().map(|b| b.seq).collect()
    }
}

#[async_trait]
impl BatchSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, batch: &RecordBatch) -> Result<(), SinkError> {
        self.attempts.lock().unwrap().push((batch.seq, Instant::now()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(entry) = failures
                .iter_mut()
                .find(|(seq, left, _)| *seq == batch.seq && *left > 0)
            {
                entry.1 -= 1;
                return Err(SinkError::status(entry.2, "rate limited"));
            }
        }
        self.batches.lock().unwrap().push(batch.clone());
        Ok(())
    }
}

pub fn ndjson_rows(count: usize) -> String {
    (0..count)
        .map(|i| format!("{{\"users.email\":\"user{i}@example.com\",\"users.city\":\"Town {i}\"}}\n"))
        .collect()
}
