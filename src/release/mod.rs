//! Detects the latest CHR release published on the MikroTik download page.

mod extract;

pub use extract::*;

use reqwest::Client;
use tracing::{debug, error, info};

use crate::{
    framework::{StateError, StateResult, describe_reqwest_error},
    version::Version,
};

/// The page listing RouterOS downloads.
pub const DEFAULT_DOWNLOAD_PAGE_URL: &str = "https://mikrotik.com/download";

/// Somewhere the latest released version can be looked up.
pub trait ReleaseSource {
    /// Looks up the latest released version.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::SourceUnreachable`] if the source cannot be read, or [`StateError::ExtractionEmpty`] if it
    /// lists no version at all.
    fn latest_version(&self) -> impl Future<Output = StateResult<Version>> + Send;
}

/// The MikroTik download page, scraped for CHR archive names.
#[derive(Debug, Clone)]
pub struct DownloadPage {
    client: Client,
    url: String,
}

impl DownloadPage {
    /// Creates a [`DownloadPage`] fetched from `url` with `client`.
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Returns the URL of the page.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches the page body.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::SourceUnreachable`] on network failure, timeout, or a non-success status.
    pub async fn fetch(&self) -> StateResult<String> {
        debug!("fetching download page from {}…", self.url);

        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(err) => {
                let detail = describe_reqwest_error(&err);
                error!("failed to fetch download page from {}: {detail}", self.url);
                return Err(StateError::SourceUnreachable(detail));
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!(
                "failed to fetch download page from {}: {} {}",
                self.url,
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            );
            return Err(StateError::SourceUnreachable(format!(
                "{} returned {status}",
                self.url
            )));
        }

        response.text().await.map_err(|err| {
            let detail = describe_reqwest_error(&err);
            error!("failed to read download page from {}: {detail}", self.url);
            StateError::SourceUnreachable(detail)
        })
    }
}

impl ReleaseSource for DownloadPage {
    async fn latest_version(&self) -> StateResult<Version> {
        info!("fetching latest RouterOS version from {}…", self.url);
        let body = self.fetch().await?;

        match extract_latest(&body) {
            Extraction::Stable(version) => {
                info!("latest RouterOS version found: {version}");
                Ok(version)
            }
            Extraction::PreReleaseOnly(version) => {
                info!("latest RouterOS version found: {version} (pre-release)");
                Ok(version)
            }
            Extraction::NotFound => {
                error!("could not find a RouterOS CHR version on {}", self.url);
                Err(StateError::ExtractionEmpty(format!(
                    "no chr-<version>.img.zip archive listed on {}",
                    self.url
                )))
            }
        }
    }
}
