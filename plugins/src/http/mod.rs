pub mod sink;

pub use sink::HttpBatchSink;

use std::time::Duration;

const BODY_PREVIEW_LIMIT: usize = 512;

/// Client for short request/response calls. Downloads use
/// [`streaming_client`] instead since they may legitimately run for hours.
pub fn request_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .build()?)
}

pub fn streaming_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()?)
}

pub(crate) fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    let mut out = String::new();
    let mut truncated = false;
    for (idx, ch) in trimmed.chars().enumerate() {
        if idx >= BODY_PREVIEW_LIMIT {
            truncated = true;
            break;
        }
        out.push(ch);
    }

    if truncated {
        out.push_str("...");
    }

    out
}

/// Reads the body of a non-2xx response into a short preview. Returns `None`
/// on success so callers can `?` straight through.
pub(crate) async fn failure_preview(resp: reqwest::Response) -> Option<(u16, String)> {
    let status = resp.status();
    if status.is_success() {
        return None;
    }
    let body = resp.text().await.unwrap_or_default();
    Some((status.as_u16(), preview_body(&body)))
}
