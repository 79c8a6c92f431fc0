// src/http.rs

//! HTTP access for resolvers and the download engine
//!
//! Resolvers and downloads only ever see the [`Transport`] trait, so the
//! whole pipeline can run against an in-memory transport in tests.

use crate::config::Settings;
use crate::error::{Error, Result};
use reqwest::blocking::{Client, RequestBuilder};
use std::io::Read;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// Host that receives the `GITHUB_TOKEN` bearer token
const GITHUB_API_HOST: &str = "api.github.com";

/// A response body being streamed from a remote server
pub struct RemoteBody {
    /// Value of the Content-Length header, if sent
    pub content_length: Option<u64>,
    pub reader: Box<dyn Read>,
}

/// Network operations needed to resolve and download artefacts
pub trait Transport {
    /// GET a URL and return the body as text; non-success status is an error
    fn get_text(&self, url: &str) -> Result<String>;

    /// Lightweight existence check
    ///
    /// Success and redirect statuses count as existing. Transport errors
    /// are reported as `false`, never as an error.
    fn probe(&self, url: &str) -> bool;

    /// Start a streaming GET; non-success status is an error
    fn get_stream(&self, url: &str) -> Result<RemoteBody>;
}

/// HTTP client wrapper with timeout and retry support
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    github_token: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client from settings
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: settings.max_retries.max(1),
            github_token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
        })
    }

    fn authorised(&self, url: &str, request: RequestBuilder) -> RequestBuilder {
        let is_github_api = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h == GITHUB_API_HOST))
            .unwrap_or(false);

        match (&self.github_token, is_github_api) {
            (Some(token), true) => request.bearer_auth(token),
            _ => request,
        }
    }
}

impl Transport for HttpClient {
    fn get_text(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.authorised(url, self.client.get(url)).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }

                    return response.text().map_err(|e| {
                        Error::DownloadError(format!("Failed to read response from {}: {}", url, e))
                    });
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to fetch {} after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!("Fetch attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    fn probe(&self, url: &str) -> bool {
        match self.client.head(url).send() {
            Ok(response) => {
                let status = response.status();
                debug!("HEAD {} -> {}", url, status);
                status.is_success() || status.is_redirection()
            }
            Err(e) => {
                debug!("HEAD {} failed: {}", url, e);
                false
            }
        }
    }

    fn get_stream(&self, url: &str) -> Result<RemoteBody> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::DownloadError(format!("Failed to download {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        Ok(RemoteBody {
            content_length: response.content_length(),
            reader: Box::new(response),
        })
    }
}
