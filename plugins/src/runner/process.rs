use std::path::PathBuf;
use std::process::Stdio;

use action_hub_core::api::{ScheduledTask, WorkerExit, WorkerLauncher, WorkerMessage, WorkerSession};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

const LINE_PREVIEW_LIMIT: usize = 200;

/// Spawns one OS process per task. By default the process is the running
/// binary re-entered through its hidden `worker` subcommand.
pub struct ProcessWorkerLauncher {
    program: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl ProcessWorkerLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            envs: Vec::new(),
        }
    }

    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe().context("cannot locate the running executable")?;
        Ok(Self::new(program, vec!["worker".to_string()]))
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl WorkerLauncher for ProcessWorkerLauncher {
    fn name(&self) -> &str {
        "process"
    }

    async fn launch(&self, task: &ScheduledTask) -> Result<Box<dyn WorkerSession>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--variant")
            .arg(task.variant.as_str())
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env("ACTION_HUB_WEBHOOK_ID", &task.correlation_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn {}", self.program.display()))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .context("worker stdout was not captured")?;

        Ok(Box::new(ProcessWorkerSession {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            exited: None,
        }))
    }
}

struct ProcessWorkerSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    exited: Option<WorkerExit>,
}

#[async_trait]
impl WorkerSession for ProcessWorkerSession {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn send(&mut self, payload: &str) -> Result<()> {
        let mut stdin = self
            .stdin
            .take()
            .context("worker request was already sent")?;
        stdin.write_all(payload.as_bytes()).await?;
        if !payload.ends_with('\n') {
            stdin.write_all(b"\n").await?;
        }
        stdin.flush().await?;
        // Dropping stdin closes the pipe so the worker sees EOF after its one request.
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<WorkerMessage>> {
        while let Some(line) = self.stdout.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let msg = serde_json::from_str::<WorkerMessage>(line)
                .with_context(|| format!("invalid worker message: {}", preview_line(line)))?;
            return Ok(Some(msg));
        }
        Ok(None)
    }

    async fn wait(&mut self) -> Result<WorkerExit> {
        if let Some(exit) = self.exited {
            return Ok(exit);
        }
        let status = self.child.wait().await?;
        let exit = exit_from_status(status);
        self.exited = Some(exit);
        Ok(exit)
    }

    async fn kill(&mut self) -> Result<()> {
        if self.exited.is_some() {
            return Ok(());
        }
        if let Some(status) = self.child.try_wait()? {
            self.exited = Some(exit_from_status(status));
            return Ok(());
        }
        self.child.kill().await?;
        let status = self.child.wait().await?;
        self.exited = Some(exit_from_status(status));
        Ok(())
    }
}

fn exit_from_status(status: std::process::ExitStatus) -> WorkerExit {
    #[cfg(unix)]
    let signal = std::os::unix::process::ExitStatusExt::signal(&status);
    #[cfg(not(unix))]
    let signal = None;

    WorkerExit {
        code: status.code(),
        signal,
    }
}

fn preview_line(line: &str) -> String {
    if line.chars().count() <= LINE_PREVIEW_LIMIT {
        return line.to_string();
    }
    let mut out: String = line.chars().take(LINE_PREVIEW_LIMIT).collect();
    out.push_str("...");
    out
}
