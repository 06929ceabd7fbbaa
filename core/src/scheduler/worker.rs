//! Child side of the worker protocol: read one request line from the parent,
//! run the connector, write `WorkerMessage` lines back.
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::types::{normalize_error_message, Variant, WorkerMessage, WorkerRequest};
use crate::hub::{Connector, Registry, Responder};

pub async fn read_request<R>(input: &mut R) -> anyhow::Result<WorkerRequest>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let n = input.read_line(&mut line).await?;
    if n == 0 {
        anyhow::bail!("parent closed stdin before sending a request");
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

pub async fn write_message<W>(output: &mut W, msg: &WorkerMessage) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    output.write_all(line.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

pub async fn run_worker<R, W>(
    registry: &Registry,
    variant: Variant,
    mut input: R,
    mut output: W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let request = read_request(&mut input).await?;
    let job = request.job;
    let version = job.client_semver();

    let resolved = match variant {
        Variant::Standard => registry.resolve(&request.connector, version.as_ref()),
        Variant::Extended => registry.resolve_extended(&request.connector, version.as_ref()),
    };
    let connector = match resolved {
        Ok(c) => c,
        Err(err) => {
            let message = normalize_error_message(&err.to_string());
            return write_message(&mut output, &WorkerMessage::Error { message }).await;
        }
    };

    tracing::info!(
        connector = %request.connector,
        variant = %variant,
        webhook_id = %job.correlation_id(),
        "worker executing"
    );

    match variant {
        Variant::Standard => {
            let msg = match connector.execute(&job).await {
                Ok(response) => WorkerMessage::Response { response },
                Err(err) => WorkerMessage::Error {
                    message: normalize_error_message(&err.to_string()),
                },
            };
            write_message(&mut output, &msg).await
        }
        Variant::Extended => run_extended(connector.as_ref(), &job, &mut output).await,
    }
}

async fn run_extended<W>(
    connector: &dyn Connector,
    job: &crate::hub::Job,
    output: &mut W,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let (responder, mut early_rx) = Responder::channel();
    let exec = connector.execute_extended(job, responder);
    tokio::pin!(exec);

    let mut replied = false;
    let mut early_closed = false;
    let result = loop {
        tokio::select! {
            res = &mut exec => break res,
            early = &mut early_rx, if !early_closed => {
                early_closed = true;
                if let Ok(response) = early {
                    write_message(output, &WorkerMessage::Response { response }).await?;
                    replied = true;
                }
            }
        }
    };
    if !early_closed {
        if let Ok(response) = early_rx.try_recv() {
            write_message(output, &WorkerMessage::Response { response }).await?;
            replied = true;
        }
    }

    match result {
        Ok(response) if !replied => {
            write_message(output, &WorkerMessage::Response { response }).await?;
        }
        Ok(response) => {
            tracing::info!(
                webhook_id = %job.correlation_id(),
                success = response.success,
                message = ?response.message,
                "extended job finished after early reply"
            );
        }
        Err(err) if !replied => {
            let message = normalize_error_message(&err.to_string());
            return write_message(output, &WorkerMessage::Error { message }).await;
        }
        Err(err) => {
            tracing::error!(
                webhook_id = %job.correlation_id(),
                error = %err,
                "extended job failed after early reply"
            );
        }
    }
    write_message(output, &WorkerMessage::Done).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{ActionResponse, ConnectorSpec, Isolation, Job, JobType};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::io::BufReader;

    struct Early;

    #[async_trait]
    impl Connector for Early {
        fn spec(&self) -> &ConnectorSpec {
            static SPEC: std::sync::OnceLock<ConnectorSpec> = std::sync::OnceLock::new();
            SPEC.get_or_init(|| {
                ConnectorSpec::new("early", "Early")
                    .supports(&[JobType::Query])
                    .isolation(Isolation::Extended)
            })
        }

        async fn execute(&self, _job: &Job) -> anyhow::Result<ActionResponse> {
            Ok(ActionResponse::ok_with_message("final"))
        }

        async fn execute_extended(
            &self,
            job: &Job,
            mut responder: Responder,
        ) -> anyhow::Result<ActionResponse> {
            if job.param("early").is_some() {
                responder.reply(ActionResponse::ok_with_message("accepted"));
            }
            if job.param("fail").is_some() {
                anyhow::bail!("");
            }
            self.execute(job).await
        }
    }

    struct Plain;

    #[async_trait]
    impl Connector for Plain {
        fn spec(&self) -> &ConnectorSpec {
            static SPEC: std::sync::OnceLock<ConnectorSpec> = std::sync::OnceLock::new();
            SPEC.get_or_init(|| ConnectorSpec::new("plain", "Plain").supports(&[JobType::Query]))
        }

        async fn execute(&self, _job: &Job) -> anyhow::Result<ActionResponse> {
            anyhow::bail!("bad credentials")
        }
    }

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.register(Arc::new(Early));
        reg.register(Arc::new(Plain));
        reg
    }

    async fn run(variant: Variant, connector: &str, job: Job) -> Vec<WorkerMessage> {
        let request = WorkerRequest {
            connector: connector.to_string(),
            job,
        };
        let input = format!("{}\n", serde_json::to_string(&request).unwrap());
        let mut out = Vec::new();
        run_worker(&registry(), variant, BufReader::new(input.as_bytes()), &mut out)
            .await
            .unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn standard_worker_reports_connector_error() {
        let msgs = run(Variant::Standard, "plain", Job::new(JobType::Query)).await;
        assert_eq!(
            msgs,
            vec![WorkerMessage::Error {
                message: "bad credentials".into()
            }]
        );
    }

    #[tokio::test]
    async fn extended_worker_replies_early_then_finishes() {
        let job = Job::new(JobType::Query).with_param("early", "1");
        let msgs = run(Variant::Extended, "early", job).await;
        assert_eq!(msgs.len(), 2);
        match &msgs[0] {
            WorkerMessage::Response { response } => {
                assert_eq!(response.message.as_deref(), Some("accepted"))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(msgs[1], WorkerMessage::Done);
    }

    #[tokio::test]
    async fn extended_worker_without_early_reply_sends_final_result() {
        let msgs = run(Variant::Extended, "early", Job::new(JobType::Query)).await;
        assert!(matches!(
            &msgs[0],
            WorkerMessage::Response { response } if response.message.as_deref() == Some("final")
        ));
        assert_eq!(msgs[1], WorkerMessage::Done);
    }

    #[tokio::test]
    async fn extended_failure_before_reply_is_normalized() {
        let job = Job::new(JobType::Query).with_param("fail", "1");
        let msgs = run(Variant::Extended, "early", job).await;
        assert_eq!(
            msgs,
            vec![WorkerMessage::Error {
                message: "Unnamed Error".into()
            }]
        );
    }

    #[tokio::test]
    async fn extended_lookup_rejects_plain_connector() {
        let msgs = run(Variant::Extended, "plain", Job::new(JobType::Query)).await;
        assert!(matches!(
            &msgs[0],
            WorkerMessage::Error { message } if message.contains("not extended")
        ));
    }
}
