//! Defines the environment variables to use, and the [`Config`] built from them at startup.

use std::{fmt::Debug, path::PathBuf, time::Duration};

use anyhow::{Context as _, anyhow, bail};
use reqwest::Client;

use crate::{
    github::{DEFAULT_API_URL, dispatch::Repository},
    release::DEFAULT_DOWNLOAD_PAGE_URL,
    store::DEFAULT_VERSION_FILE,
};

/// The default repository whose workflow is dispatched.
pub const DEFAULT_REPOSITORY: &str = "CalebSargeant/mikrotik-chr";
/// The default workflow to dispatch.
pub const DEFAULT_WORKFLOW_ID: &str = "build-chr.yml";
/// The default branch the workflow runs on.
pub const DEFAULT_WORKFLOW_REF: &str = "main";
/// The default timeout of every HTTP request, in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Everything a run needs to know, read once at startup.
#[derive(Clone)]
pub struct Config {
    /// The GitHub App ID.
    pub app_id: String,
    /// The PEM-encoded RSA private key of the GitHub App.
    pub private_key: String,
    /// The repository whose workflow is dispatched.
    pub repository: Repository,
    /// The workflow file name or ID.
    pub workflow_id: String,
    /// The branch the workflow runs on.
    pub workflow_ref: String,
    /// Where the last dispatched version is stored.
    pub version_file: PathBuf,
    /// The page scraped for releases.
    pub download_page_url: String,
    /// The GitHub REST API root.
    pub api_url: String,
    /// The timeout of every HTTP request.
    pub http_timeout: Duration,
}

impl Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("app_id", &self.app_id)
            .field("private_key", &"<redacted>")
            .field("repository", &self.repository)
            .field("workflow_id", &self.workflow_id)
            .field("workflow_ref", &self.workflow_ref)
            .field("version_file", &self.version_file)
            .field("download_page_url", &self.download_page_url)
            .field("api_url", &self.api_url)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a variable is malformed.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of a variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a variable is malformed.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_owned());

        let app_id = var("GITHUB_APP_ID")
            .ok_or_else(|| anyhow!("GITHUB_APP_ID environment variable is required"))?
            .trim()
            .to_owned();

        let private_key = match (var("GITHUB_PRIVATE_KEY"), var("GITHUB_PRIVATE_KEY_FILE")) {
            (Some(_), Some(_)) => {
                bail!("only one of GITHUB_PRIVATE_KEY and GITHUB_PRIVATE_KEY_FILE may be set")
            }
            (Some(key), None) => unescape_newlines(&key),
            (None, Some(path)) => std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read GITHUB_PRIVATE_KEY_FILE {path:?}"))?,
            (None, None) => bail!("GITHUB_PRIVATE_KEY environment variable is required"),
        };

        let coordinate = or("GITHUB_REPO", DEFAULT_REPOSITORY);
        let repository = Repository::parse(&coordinate)
            .ok_or_else(|| anyhow!("GITHUB_REPO must be in owner/name form, got {coordinate:?}"))?;

        let http_timeout = match var("HTTP_TIMEOUT_SECS") {
            Some(secs) => match secs.trim().parse::<u64>() {
                Ok(0) => bail!("HTTP_TIMEOUT_SECS must be positive"),
                Ok(secs) => Duration::from_secs(secs),
                Err(err) => bail!("invalid HTTP_TIMEOUT_SECS {secs:?}: {err}"),
            },
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            app_id,
            private_key,
            repository,
            workflow_id: or("WORKFLOW_ID", DEFAULT_WORKFLOW_ID),
            workflow_ref: or("WORKFLOW_REF", DEFAULT_WORKFLOW_REF),
            version_file: PathBuf::from(or("VERSION_FILE", DEFAULT_VERSION_FILE)),
            download_page_url: or("DOWNLOAD_PAGE_URL", DEFAULT_DOWNLOAD_PAGE_URL),
            api_url: or("GITHUB_API_URL", DEFAULT_API_URL),
            http_timeout,
        })
    }

    /// Builds the HTTP client shared by every request of a run.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn http_client(&self) -> anyhow::Result<Client> {
        Client::builder()
            .timeout(self.http_timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .context("failed to create HTTP client")
    }
}

/// Turns literal `\n` sequences into newlines. Secret stores often flatten PEM keys this way.
fn unescape_newlines(key: &str) -> String {
    if key.contains("-----BEGIN") && !key.contains('\n') {
        key.replace("\\n", "\n")
    } else {
        key.to_owned()
    }
}

/// Checks if `LOG_FORMAT=json` in the process environment asks for structured log output.
///
/// Read apart from [`Config`] so logging is up before configuration errors are reported.
pub fn json_logs() -> bool {
    json_logs_from(|key| std::env::var(key).ok())
}

/// Checks if `LOG_FORMAT=json` asks for structured log output, reading variables through `lookup`.
pub fn json_logs_from<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup("LOG_FORMAT").is_some_and(|format| format.trim().eq_ignore_ascii_case("json"))
}
