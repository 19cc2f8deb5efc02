//! HTTP snapshot camera source.
//!
//! Fetches one JPEG per request from cameras that expose a still-image
//! endpoint (most IP cameras and ESP32 camera firmwares do).

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::Duration;
use url::Url;

use super::{CapturedFrame, FrameSource};

const MAX_JPEG_BYTES: u64 = 5 * 1024 * 1024;
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SnapshotSource {
    url: String,
    width: u32,
    agent: ureq::Agent,
    frame_count: u64,
}

impl SnapshotSource {
    pub fn new(url: &str, width: u32) -> Result<Self> {
        let parsed = Url::parse(url).context("parse snapshot url")?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported snapshot scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        let agent = ureq::AgentBuilder::new().timeout(FETCH_TIMEOUT).build();
        Ok(Self {
            url: url.to_string(),
            width,
            agent,
            frame_count: 0,
        })
    }

    pub fn frames_fetched(&self) -> u64 {
        self.frame_count
    }

    fn fetch(&self) -> Result<Vec<u8>> {
        let response = self
            .agent
            .get(&self.url)
            .call()
            .with_context(|| format!("fetch jpeg snapshot from {}", self.url))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_JPEG_BYTES)
            .read_to_end(&mut bytes)
            .context("read jpeg snapshot")?;
        if bytes.is_empty() {
            return Err(anyhow!("empty jpeg snapshot"));
        }
        Ok(bytes)
    }
}

impl FrameSource for SnapshotSource {
    fn describe(&self) -> String {
        format!("snapshot camera {}", self.url)
    }

    fn connect(&mut self) -> Result<()> {
        self.fetch().map(|_| ())
    }

    fn next_frame(&mut self) -> Result<CapturedFrame> {
        let bytes = self.fetch()?;
        self.frame_count += 1;
        CapturedFrame::from_jpeg(&bytes, self.width)
    }
}
