use std::path::{Path, PathBuf};

use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, info};

use crate::error::DownloadError;

use super::ArtifactDescriptor;

/// Slice of the overall 0-100 progress bar a phase may move through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressRange {
    start: u8,
    end: u8,
}

impl ProgressRange {
    pub fn new(start: u8, end: u8) -> Self {
        let end = end.min(100);
        Self {
            start: start.min(end),
            end,
        }
    }

    pub fn start(&self) -> u8 {
        self.start
    }

    pub fn end(&self) -> u8 {
        self.end
    }

    /// Position of `done` out of `total` bytes inside the range.
    pub fn map(&self, done: u64, total: u64) -> u8 {
        if total == 0 {
            return self.start;
        }
        let span = u64::from(self.end - self.start);
        let offset = (done.saturating_mul(span) / total).min(span);
        self.start + offset as u8
    }
}

/// Streams artifacts to disk over HTTP(S).
#[derive(Debug, Clone, Default)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Downloads `descriptor` into `dest_dir`, calling `progress` with
    /// non-decreasing percentages inside `range`. The last report on success
    /// is `range.end()`. A failed download may leave a partial file behind.
    pub async fn download<F>(
        &self,
        descriptor: &ArtifactDescriptor,
        dest_dir: &Path,
        range: ProgressRange,
        mut progress: F,
    ) -> Result<PathBuf, DownloadError>
    where
        F: FnMut(u8),
    {
        let target = dest_dir.join(&descriptor.file_name);
        info!(url = %descriptor.url, target = %target.display(), "downloading");

        let mut response = self.client.get(&descriptor.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: descriptor.url.clone(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let mut out = File::create(&target).await?;
        let mut done: u64 = 0;
        let mut last = range.start();
        progress(last);

        while let Some(chunk) = response.chunk().await? {
            out.write_all(&chunk).await?;
            done += chunk.len() as u64;

            let pct = range.map(done, total);
            if pct > last {
                last = pct;
                progress(pct);
            }
        }
        out.flush().await?;
        out.sync_all().await?;

        if last < range.end() {
            progress(range.end());
        }
        debug!(bytes = done, "download complete");

        Ok(target)
    }
}
