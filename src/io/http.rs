use anyhow::{anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::io::{self, Read, Seek, SeekFrom};
use std::thread;
use std::time::Duration;

/// Smallest request issued for a read. Discovery reads records a few bytes at
/// a time, so each request fills a window that serves the following reads.
const READ_AHEAD: usize = 64 * 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRY: u32 = 10;

/// Seekable stream over a remote file, fetched with HTTP Range requests.
pub struct HttpRangeStream {
    client: Client,
    url: String,
    size: u64,
    position: u64,
    window: Vec<u8>,
    window_start: u64,
    transferred_bytes: u64,
    max_retry: u32,
}

impl HttpRangeStream {
    /// Create a new HTTP Range stream
    ///
    /// This will send a HEAD request to verify Range support and get file size
    pub fn new(url: String) -> anyhow::Result<Self> {
        Self::with_options(url, DEFAULT_TIMEOUT, DEFAULT_MAX_RETRY)
    }

    pub fn with_options(url: String, timeout: Duration, max_retry: u32) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        let resp = client.head(&url).send()?;
        if !resp.status().is_success() {
            bail!("HTTP request failed with status: {}", resp.status());
        }

        let accept_ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");
        if !accept_ranges.contains("bytes") {
            bail!("Remote server does not support Range requests");
        }

        let size = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("Remote server did not return Content-Length"))?;

        log::debug!("[HTTP] {url}: {size} bytes, range requests supported");

        Ok(Self {
            client,
            url,
            size,
            position: 0,
            window: Vec::new(),
            window_start: 0,
            transferred_bytes: 0,
            max_retry: max_retry.max(1),
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes
    }

    /// Fetch `len` bytes starting at `offset`, resuming after short bodies
    /// and retrying timeouts and connection failures.
    fn fetch(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let end = offset + len as u64 - 1;
        let mut buf = Vec::with_capacity(len);
        let mut retry_count = 0;

        while buf.len() < len {
            let range = format!("bytes={}-{}", offset + buf.len() as u64, end);
            let result = self.client.get(&self.url).header("Range", &range).send();

            match result {
                Ok(resp) => {
                    if resp.status() != StatusCode::PARTIAL_CONTENT {
                        return Err(io::Error::other(format!(
                            "HTTP request failed with status: {}",
                            resp.status()
                        )));
                    }
                    let bytes = resp.bytes().map_err(io::Error::other)?;
                    if bytes.is_empty() {
                        return Err(io::ErrorKind::UnexpectedEof.into());
                    }
                    let chunk_len = bytes.len().min(len - buf.len());
                    buf.extend_from_slice(&bytes[..chunk_len]);
                    self.transferred_bytes += chunk_len as u64;
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(io::Error::other(format!("max retries exceeded: {e}")));
                    }
                    log::warn!(
                        "[HTTP] Connection error, retry {}/{}: {}",
                        retry_count,
                        self.max_retry,
                        e
                    );
                    thread::sleep(Duration::from_millis(500 * retry_count as u64));
                }
                Err(e) => return Err(io::Error::other(e)),
            }
        }

        Ok(buf)
    }

    fn window_end(&self) -> u64 {
        self.window_start + self.window.len() as u64
    }
}

impl Read for HttpRangeStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.size {
            return Ok(0);
        }

        if self.position < self.window_start || self.position >= self.window_end() {
            let remaining = self.size - self.position;
            let len = (buf.len().max(READ_AHEAD) as u64).min(remaining) as usize;
            self.window = self.fetch(self.position, len)?;
            self.window_start = self.position;
        }

        let start = (self.position - self.window_start) as usize;
        let available = &self.window[start..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for HttpRangeStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = resolve_seek(self.position, self.size, pos)?;
        Ok(self.position)
    }
}

fn resolve_seek(position: u64, size: u64, pos: SeekFrom) -> io::Result<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => Some(offset),
        SeekFrom::End(delta) => size.checked_add_signed(delta),
        SeekFrom::Current(delta) => position.checked_add_signed(delta),
    };
    target.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid seek to a negative or overflowing position",
        )
    })
}
