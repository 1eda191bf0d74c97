//! Triggers a GitHub Actions workflow through a `workflow_dispatch` event.

use std::fmt::Display;

use reqwest::Method;
use serde::Serialize;
use tracing::{error, info};

use crate::{
    framework::{StateError, StateResult, describe_reqwest_error},
    github::{GitHubApi, describe_failure},
    version::Version,
};

/// Something that can start a build for a version.
pub trait Dispatch {
    /// Starts a build of `version`, authenticated with the bearer `token`.
    ///
    /// Success means the request was accepted, not that the build finished.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::DispatchRejected`] if the request fails or is not accepted.
    fn dispatch(
        &self,
        token: &str,
        version: &Version,
    ) -> impl Future<Output = StateResult<()>> + Send;
}

/// The body of a `workflow_dispatch` request.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    /// The branch or tag the workflow runs on.
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// The workflow inputs.
    pub inputs: DispatchInputs,
}

/// The inputs passed to the dispatched workflow.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct DispatchInputs {
    /// The RouterOS version to build.
    pub version: String,
}

impl DispatchRequest {
    /// Creates a request building `version` on `git_ref`.
    pub fn new(git_ref: impl Into<String>, version: &Version) -> Self {
        Self {
            git_ref: git_ref.into(),
            inputs: DispatchInputs {
                version: version.as_str().to_owned(),
            },
        }
    }
}

/// A repository on GitHub, in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// The owning user or organization.
    pub owner: String,
    /// The repository name.
    pub name: String,
}

impl Repository {
    /// Parses `owner/name`.
    ///
    /// Returns [`None`] unless there are exactly two non-empty segments.
    pub fn parse(coordinate: &str) -> Option<Self> {
        let (owner, name) = coordinate.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_owned(),
            name: name.to_owned(),
        })
    }
}

impl Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A workflow of a repository, dispatched on a fixed branch.
#[derive(Debug, Clone)]
pub struct WorkflowDispatcher {
    api: GitHubApi,
    repository: Repository,
    workflow_id: String,
    git_ref: String,
}

impl WorkflowDispatcher {
    /// Creates a [`WorkflowDispatcher`] for the workflow `workflow_id` (a file name like `build-chr.yml` or a numeric
    /// ID) of `repository`, run on `git_ref`.
    pub fn new(
        api: GitHubApi,
        repository: Repository,
        workflow_id: impl Into<String>,
        git_ref: impl Into<String>,
    ) -> Self {
        Self {
            api,
            repository,
            workflow_id: workflow_id.into(),
            git_ref: git_ref.into(),
        }
    }

    /// Returns the API path of the dispatch endpoint.
    pub fn path(&self) -> String {
        format!(
            "repos/{}/{}/actions/workflows/{}/dispatches",
            self.repository.owner, self.repository.name, self.workflow_id
        )
    }
}

impl Dispatch for WorkflowDispatcher {
    async fn dispatch(&self, token: &str, version: &Version) -> StateResult<()> {
        info!(
            "triggering workflow {} of {} for RouterOS version {version}…",
            self.workflow_id, self.repository
        );

        let path = self.path();
        let url = self.api.url(&path);
        let response = self
            .api
            .request(Method::POST, &path, token)
            .json(&DispatchRequest::new(&self.git_ref, version))
            .send()
            .await
            .map_err(|err| {
                let detail = describe_reqwest_error(&err);
                error!("failed to trigger workflow at {url}: {detail}");
                StateError::DispatchRejected(detail)
            })?;

        if !response.status().is_success() {
            let detail = describe_failure(response).await;
            error!("failed to trigger workflow at {url}: {detail}");
            return Err(StateError::DispatchRejected(detail));
        }

        info!("workflow triggered for version {version}");
        Ok(())
    }
}
