use action_hub_core::api::{
    row_events_from_byte_stream, row_events_from_bytes, IngestError, Job, RowEvent,
};
use anyhow::{bail, Context, Result};
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::http::preview_body;

pub type RowEventStream = BoxStream<'static, Result<RowEvent, IngestError>>;

/// Opens the download URL and parses the body as it arrives.
pub async fn open_download(http: &reqwest::Client, url: &str) -> Result<RowEventStream> {
    let resp = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to open download url {url}"))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!(
            "download url answered HTTP {}: {}",
            status.as_u16(),
            preview_body(&body)
        );
    }

    tracing::debug!(url = %url, content_length = ?resp.content_length(), "download opened");
    Ok(row_events_from_byte_stream(resp.bytes_stream()).boxed())
}

/// Row source for a job: the download URL when present, otherwise the pushed
/// attachment.
pub async fn open_job_rows(http: &reqwest::Client, job: &Job) -> Result<RowEventStream> {
    if let Some(url) = job.download_url() {
        return open_download(http, url).await;
    }
    match &job.attachment {
        Some(attachment) => {
            let bytes = attachment.bytes()?;
            Ok(row_events_from_bytes(bytes).boxed())
        }
        None => bail!("request carries neither a download url nor an attachment"),
    }
}
