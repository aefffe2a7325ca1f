use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, LAST_MODIFIED};
use reqwest::{Client, Response, Url};
use std::time::Duration;

use super::ByteSource;
use crate::zip::{EntryName, Input};
use anyhow::{Result, bail};

const MAX_RETRY: u32 = 10;

/// Response body of an HTTP download, streamed chunk by chunk
pub struct HttpSource {
    response: Response,
}

impl HttpSource {
    pub fn new(response: Response) -> Self {
        Self { response }
    }

    /// Start downloading `url` and describe it as a streamed member.
    ///
    /// The member size comes from `Content-Length` (unknown when absent) and the
    /// modification time from `Last-Modified`.
    pub async fn open(url: &str) -> Result<Input> {
        let client = client()?;
        let resp = send_with_retry(|| client.get(url)).await?;
        let name = member_name(resp.url());
        let size = resp.content_length();
        let modified = last_modified(resp.headers());

        Ok(Input::Stream {
            name,
            size,
            modified,
            source: Box::new(Self::new(resp)),
        })
    }

    /// Describe `url` from a HEAD request without downloading anything
    pub async fn probe(url: &str) -> Result<Input> {
        let client = client()?;
        let resp = send_with_retry(|| client.head(url)).await?;

        // `Response::content_length` reports the (empty) body for HEAD
        let size = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());

        Ok(Input::Meta {
            name: member_name(resp.url()),
            size,
            modified: last_modified(resp.headers()),
            crc32: None,
        })
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        self.response.chunk().await.map_err(std::io::Error::other)
    }
}

fn client() -> Result<Client> {
    Ok(Client::builder().connect_timeout(Duration::from_secs(30)).build()?)
}

/// Send a request, retrying connection failures.
///
/// Only the request itself is retried; once the body is streaming into an archive
/// a failure aborts the archive.
async fn send_with_retry<F>(make_request: F) -> Result<Response>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut retry_count = 0;
    loop {
        match make_request().send().await {
            Ok(resp) => {
                if !resp.status().is_success() {
                    bail!("HTTP request failed with status: {}", resp.status());
                }
                return Ok(resp);
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                retry_count += 1;
                if retry_count >= MAX_RETRY {
                    bail!("Max retries exceeded");
                }
                log::warn!("Connection error, retry {}/{}: {}", retry_count, MAX_RETRY, e);
                tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Last non-empty path segment of the (possibly redirected) URL
fn member_name(url: &Url) -> EntryName {
    let name = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .or_else(|| url.host_str())
        .unwrap_or("download");
    EntryName::Text(name.to_string())
}

fn last_modified(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let value = headers.get(LAST_MODIFIED)?.to_str().ok()?;
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
