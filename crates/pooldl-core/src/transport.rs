//! libcurl transport: one `Easy` handle per pooled connection.
//!
//! libcurl keeps the underlying TCP/TLS connection of an `Easy` handle alive
//! between transfers, so reusing the handle across downloads reuses the
//! connection when consecutive items live on the same host. Transfers are
//! blocking and run on tokio's blocking pool.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use curl::easy::Easy;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

use crate::config::TransportConfig;
use crate::connection::{Connect, Connection};

/// Body and response metadata of one completed GET.
#[derive(Clone)]
pub struct Downloaded {
    /// The requested URL (before redirects).
    pub url: Url,
    /// Content-Disposition of the final response, if sent.
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl fmt::Debug for Downloaded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloaded")
            .field("url", &self.url.as_str())
            .field("content_disposition", &self.content_disposition)
            .field("bytes", &self.body.len())
            .finish()
    }
}

/// Creates configured curl handles.
#[derive(Debug, Clone, Default)]
pub struct CurlConnector {
    config: TransportConfig,
    next_id: Arc<AtomicUsize>,
}

impl CurlConnector {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            next_id: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Connect for CurlConnector {
    type Conn = CurlConnection;

    async fn connect(&self) -> Result<CurlConnection> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut easy = Easy::new();
        easy.follow_location(true)?;
        easy.connect_timeout(self.config.connect_timeout())?;
        easy.timeout(self.config.timeout())?;
        easy.tcp_keepalive(true)?;
        if let Some(agent) = &self.config.user_agent {
            easy.useragent(agent)?;
        }
        tracing::debug!(connection = id, "curl handle created");
        Ok(CurlConnection {
            id,
            easy: Arc::new(Mutex::new(Some(easy))),
        })
    }
}

/// One curl handle. `None` once closed.
pub struct CurlConnection {
    id: usize,
    easy: Arc<Mutex<Option<Easy>>>,
}

impl fmt::Debug for CurlConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurlConnection").field("id", &self.id).finish()
    }
}

#[async_trait]
impl Connection for CurlConnection {
    type Item = Url;
    type Content = Downloaded;

    async fn download(&self, url: &Url) -> Result<Downloaded> {
        let easy = Arc::clone(&self.easy);
        let url = url.clone();
        let id = self.id;
        tokio::task::spawn_blocking(move || {
            let mut guard = easy.lock().unwrap_or_else(PoisonError::into_inner);
            let easy = guard
                .as_mut()
                .ok_or_else(|| anyhow!("connection {} is closed", id))?;
            fetch(easy, url)
        })
        .await
        .context("download task panicked")?
    }

    async fn close(&self) -> Result<()> {
        let easy = Arc::clone(&self.easy);
        // Waits for a transfer still running on this handle.
        let handle = tokio::task::spawn_blocking(move || {
            easy.lock().unwrap_or_else(PoisonError::into_inner).take()
        })
        .await
        .context("close task panicked")?;
        drop(handle);
        tracing::debug!(connection = self.id, "curl handle closed");
        Ok(())
    }
}

/// GET `url` on `easy`, collecting the body and the final response's headers.
fn fetch(easy: &mut Easy, url: Url) -> Result<Downloaded> {
    easy.url(url.as_str()).context("invalid URL")?;

    let mut body = Vec::new();
    let mut headers: Vec<String> = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            if let Ok(line) = std::str::from_utf8(line) {
                // A status line starts a new response (redirects, 100-continue).
                if line.starts_with("HTTP/") {
                    headers.clear();
                }
                headers.push(line.trim_end().to_string());
            }
            true
        })?;
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer
            .perform()
            .with_context(|| format!("GET {} failed", url))?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        bail!("GET {} returned HTTP {}", url, code);
    }

    Ok(Downloaded {
        content_disposition: header_value(&headers, "content-disposition"),
        url,
        body,
    })
}

fn header_value(lines: &[String], name: &str) -> Option<String> {
    lines.iter().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}
