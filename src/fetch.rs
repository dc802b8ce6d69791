//! HTTP download with ordered link fallback

use crate::config::Config;
use crate::error::{MediaError, Result};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Fetches media payloads over HTTP
///
/// A fetch walks its candidate links in order and returns the first non-empty
/// successful body. Network errors, non-success statuses and empty bodies all
/// move on to the next link.
///
/// The timeout bounds each network operation (connecting, waiting for the
/// response head, waiting for the next body chunk), not the whole transfer:
/// a slow download that keeps making progress is never cut off.
#[derive(Clone, Debug)]
pub struct DownloadClient {
    http: reqwest::Client,
    idle_timeout: Duration,
}

impl DownloadClient {
    /// Create a client with a per-operation timeout and user agent
    pub fn new(idle_timeout: Duration, user_agent: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(idle_timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { http, idle_timeout })
    }

    /// Create a client from the fetch settings of `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.fetch_timeout, &config.user_agent)
    }

    /// Download the first link that yields a non-empty successful body
    ///
    /// # Errors
    ///
    /// [`MediaError::LinkExhausted`] when every link failed (including an
    /// empty link list).
    pub async fn fetch(&self, links: &[&str]) -> Result<Vec<u8>> {
        for (index, url) in links.iter().enumerate() {
            match self.fetch_one(url).await {
                Ok(body) => {
                    debug!(url, index, bytes = body.len(), "fetched payload");
                    return Ok(body);
                }
                Err(reason) => debug!(url, index, %reason, "link failed"),
            }
        }

        Err(MediaError::LinkExhausted { tried: links.len() }.into())
    }

    async fn fetch_one(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let sent = timeout(self.idle_timeout, self.http.get(url).send())
            .await
            .map_err(|_| format!("no response within {}s", self.idle_timeout.as_secs_f32()))?;
        let mut response = sent.map_err(|e| {
            if e.is_timeout() {
                format!("timeout: {}", e)
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                e.to_string()
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        let mut body = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        loop {
            let chunk = timeout(self.idle_timeout, response.chunk())
                .await
                .map_err(|_| {
                    format!(
                        "stalled for {}s after {} bytes",
                        self.idle_timeout.as_secs_f32(),
                        body.len()
                    )
                })?
                .map_err(|e| format!("failed to read body: {}", e))?;
            match chunk {
                Some(bytes) => body.extend_from_slice(&bytes),
                None => break,
            }
        }

        if body.is_empty() {
            return Err("empty body".into());
        }
        Ok(body)
    }
}
