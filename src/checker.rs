//! Sequences a run: detect the latest release, compare it with the stored one, and dispatch a build on change.

use std::fmt::Display;

use tracing::{debug, error, info, warn};

use crate::{
    env::Config,
    framework::StateResult,
    github::{
        GitHubApi,
        app::{GitHubApp, TokenMinter},
        dispatch::{Dispatch, WorkflowDispatcher},
    },
    release::{DownloadPage, ReleaseSource},
    store::{FileVersionStore, VersionStore},
    version::Version,
};

/// The steps of a run, in order.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Looking up the latest release.
    Fetching,
    /// Comparing the latest release with the stored version.
    Comparing,
    /// Minting an installation token.
    Minting,
    /// Dispatching the build workflow.
    Dispatching,
    /// Storing the dispatched version.
    Persisting,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Fetching => "fetching",
            Self::Comparing => "comparing",
            Self::Minting => "minting",
            Self::Dispatching => "dispatching",
            Self::Persisting => "persisting",
        })
    }
}

/// How a successful run ended.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The latest release was already dispatched; nothing was done.
    UpToDate {
        /// The latest release.
        version: Version,
    },
    /// A build of a new release was dispatched.
    Dispatched {
        /// The release that was dispatched.
        version: Version,
        /// The previously stored version, if any.
        previous: Option<String>,
        /// Whether the new version was stored. If not, the next run dispatches it again.
        persisted: bool,
    },
}

/// Maps the result of a run to the process exit code: `0` on success, `1` on any failure.
pub fn exit_code<T>(result: &StateResult<T>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Detects new releases and dispatches builds for them.
#[derive(Debug)]
pub struct Checker<S, V, M, D> {
    source: S,
    store: V,
    minter: M,
    dispatcher: D,
}

/// The [`Checker`] wired to the MikroTik download page, a version file, and GitHub.
pub type GitHubChecker = Checker<DownloadPage, FileVersionStore, GitHubApp, WorkflowDispatcher>;

impl GitHubChecker {
    /// Wires a [`Checker`] from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = config.http_client()?;
        let api = GitHubApi::new(client.clone(), &config.api_url);

        Ok(Checker::new(
            DownloadPage::new(client, &config.download_page_url),
            FileVersionStore::new(&config.version_file),
            GitHubApp::new(api.clone(), &config.app_id, &config.private_key),
            WorkflowDispatcher::new(
                api,
                config.repository.clone(),
                &config.workflow_id,
                &config.workflow_ref,
            ),
        ))
    }
}

impl<S, V, M, D> Checker<S, V, M, D>
where
    S: ReleaseSource,
    V: VersionStore,
    M: TokenMinter,
    D: Dispatch,
{
    /// Creates a [`Checker`] from its components.
    pub fn new(source: S, store: V, minter: M, dispatcher: D) -> Self {
        Self {
            source,
            store,
            minter,
            dispatcher,
        }
    }

    /// Runs a single check.
    ///
    /// # Errors
    ///
    /// Returns the error of the first step that failed. Failing to store the version after a successful dispatch is
    /// not an error; it is reported through the
    /// `persisted` flag of [`Outcome::Dispatched`] instead.
    pub async fn run(&self) -> StateResult<Outcome> {
        info!("RouterOS version check starting");

        let result = self.check().await;
        match &result {
            Ok(Outcome::UpToDate { version }) => {
                info!("no new version detected (current: {version}), no action needed")
            }
            Ok(Outcome::Dispatched {
                persisted: true, ..
            }) => info!("RouterOS version check completed"),
            Ok(Outcome::Dispatched {
                persisted: false, ..
            }) => warn!("RouterOS version check completed, but the version was not stored"),
            Err(err) => error!("RouterOS version check failed: {err}"),
        }

        result
    }

    async fn check(&self) -> StateResult<Outcome> {
        debug!("stage: {}", Stage::Fetching);
        let latest = self.source.latest_version().await?;

        debug!("stage: {}", Stage::Comparing);
        let current = self.store.read().await;
        if current.as_deref() == Some(latest.as_str()) {
            return Ok(Outcome::UpToDate { version: latest });
        }
        info!(
            "new version detected! current: {}, latest: {latest}",
            current.as_deref().unwrap_or("none")
        );

        debug!("stage: {}", Stage::Minting);
        let token = self.minter.mint_token().await?;

        debug!("stage: {}", Stage::Dispatching);
        self.dispatcher.dispatch(&token.token, &latest).await?;

        debug!("stage: {}", Stage::Persisting);
        // Non-fatal: the workflow is already dispatched
        let persisted = match self.store.write(latest.as_str()).await {
            Ok(()) => true,
            Err(err) => {
                warn!("failed to update stored version, but the workflow was triggered: {err}");
                false
            }
        };

        Ok(Outcome::Dispatched {
            version: latest,
            previous: current,
            persisted,
        })
    }
}
