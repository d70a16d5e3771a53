// src/remote/http.rs

//! HTTP license and content source with retry support

use super::{
    ContentDownloader, DownloadRequest, DownloadedPackage, KeyInfo, LicenseApi, META_FILE_NAME,
    PACKAGE_FILE_NAME, local_package_paths, stream_to_file, version_path,
};
use crate::cancellation::CancellationToken;
use crate::error::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for failed requests
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

const APP_SECRET_HEADER: &str = "X-App-Secret";
const KEY_SECRET_HEADER: &str = "X-Key-Secret";

/// Blocking HTTP client for a content server
#[derive(Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
    max_retries: u32,
}

impl HttpRemote {
    /// Create a client for the server at `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: MAX_RETRIES,
        })
    }

    /// Override the number of attempts per request
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// GET `url`, retrying transport failures with a linear backoff
    fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        cancel: Option<&CancellationToken>,
    ) -> Result<Response> {
        let mut attempt = 0;
        loop {
            if let Some(cancel) = cancel {
                cancel.check("download")?;
            }
            attempt += 1;

            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            match request.send() {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Request to {} failed after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!("Request attempt {} to {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    fn download_file(
        &self,
        remote_path: &str,
        dest_path: &Path,
        key_secret: Option<&str>,
        on_progress: &mut dyn FnMut(u64, u64),
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let url = self.url(remote_path);
        info!("Downloading {} to {}", url, dest_path.display());

        let headers: Vec<(&str, &str)> = key_secret
            .map(|secret| vec![(KEY_SECRET_HEADER, secret)])
            .unwrap_or_default();

        let mut response = self.get(&url, &headers, Some(cancel))?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::LicenseInvalid(format!(
                    "server refused key secret for {}",
                    url
                )));
            }
            status if !status.is_success() => {
                return Err(Error::DownloadError(format!("HTTP {} from {}", status, url)));
            }
            _ => {}
        }

        let total = response.content_length().unwrap_or(0);
        let written = stream_to_file(&mut response, dest_path, total, on_progress, cancel)?;

        if total > 0 && written != total {
            return Err(Error::DownloadError(format!(
                "Short read from {}: {} of {} bytes",
                url, written, total
            )));
        }

        info!("Successfully downloaded to {}", dest_path.display());
        Ok(written)
    }
}

impl LicenseApi for HttpRemote {
    fn key_info(&self, app_secret: &str, key: &str) -> Result<KeyInfo> {
        let url = self.url(&format!("keys/{}", key));
        debug!("Checking license key at {}", url);

        let response = self.get(&url, &[(APP_SECRET_HEADER, app_secret)], None)?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                return Err(Error::LicenseInvalid(key.to_string()));
            }
            StatusCode::FORBIDDEN => {
                return Err(Error::LicenseBlocked(key.to_string()));
            }
            status if !status.is_success() => {
                return Err(Error::DownloadError(format!("HTTP {} from {}", status, url)));
            }
            _ => {}
        }

        response
            .json::<KeyInfo>()
            .map_err(|e| Error::DownloadError(format!("Failed to parse key info JSON: {}", e)))
    }
}

impl ContentDownloader for HttpRemote {
    fn download(
        &self,
        request: &DownloadRequest<'_>,
        on_progress: &mut dyn FnMut(u64, u64),
        cancel: &CancellationToken,
    ) -> Result<DownloadedPackage> {
        let (package_path, meta_path) =
            local_package_paths(request.destination_dir, request.version_id);

        let meta_path = if request.with_meta {
            self.download_file(
                &version_path(request.version_id, META_FILE_NAME),
                &meta_path,
                request.key_secret,
                &mut |_, _| {},
                cancel,
            )?;
            Some(meta_path)
        } else {
            None
        };

        self.download_file(
            &version_path(request.version_id, PACKAGE_FILE_NAME),
            &package_path,
            request.key_secret,
            on_progress,
            cancel,
        )?;

        Ok(DownloadedPackage {
            package_path,
            meta_path,
        })
    }
}
