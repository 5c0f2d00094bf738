//! Streaming downloads to disk

use futures::StreamExt;
use lspkg_errors::Error;
use lspkg_events::{EventEmitter, EventSender};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::client::{map_reqwest_error, NetClient};
use crate::validation::{validate_response, validate_url};

/// Result of a download operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadResult {
    pub status: u16,
    pub size: u64,
}

/// A single download request
#[derive(Debug, Clone)]
pub struct Download<'a> {
    url: &'a str,
    timeout: Duration,
    package: Option<&'a str>,
}

impl<'a> Download<'a> {
    #[must_use]
    pub fn new(url: &'a str, timeout: Duration) -> Self {
        Self {
            url,
            timeout,
            package: None,
        }
    }

    /// Name reported in download events
    #[must_use]
    pub fn for_package(mut self, package: &'a str) -> Self {
        self.package = Some(package);
        self
    }

    /// Stream the response body into `dest`, replacing any existing file.
    ///
    /// A partial file is removed on failure.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl`/`UnsupportedProtocol` for bad URLs, `Timeout` when
    /// the request exceeds its timeout, `HttpError` for non-2xx statuses and
    /// `DownloadFailed` or an I/O error when the body cannot be written.
    pub async fn execute(
        &self,
        client: &NetClient,
        dest: &Path,
        tx: Option<&EventSender>,
    ) -> Result<DownloadResult, Error> {
        let package = self.package.map(str::to_string);
        let result = self.stream_to(client, dest, tx).await;

        if let Some(tx) = tx {
            match &result {
                Ok(done) => tx.emit_download_completed(self.url, package, done.size),
                Err(err) => tx.emit_download_failed(self.url, package, err),
            }
        }
        if result.is_err() {
            let _ = tokio::fs::remove_file(dest).await;
        }
        result
    }

    async fn stream_to(
        &self,
        client: &NetClient,
        dest: &Path,
        tx: Option<&EventSender>,
    ) -> Result<DownloadResult, Error> {
        validate_url(self.url)?;
        tracing::debug!(url = self.url, dest = %dest.display(), "starting download");

        let response = client.get_with_timeout(self.url, self.timeout).await?;
        validate_response(&response)?;
        let status = response.status().as_u16();

        if let Some(tx) = tx {
            tx.emit_download_started(
                self.url,
                self.package.map(str::to_string),
                response.content_length(),
            );
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::io_with_path(&e, dest))?;
        let mut stream = response.bytes_stream();
        let mut size = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_reqwest_error(self.url, &e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io_with_path(&e, dest))?;
            size += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| Error::io_with_path(&e, dest))?;

        Ok(DownloadResult { status, size })
    }
}

/// Fetch binary content from a URL
///
/// # Errors
///
/// Returns an error if the HTTP request fails, the server returns an error
/// status, or the response body cannot be read.
pub async fn fetch_bytes(client: &NetClient, url: &str) -> Result<Vec<u8>, Error> {
    validate_url(url)?;
    let response = client.get(url).await?;
    validate_response(&response)?;

    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| map_reqwest_error(url, &e))
}
