//! GitHub REST API plumbing: GitHub App authentication and workflow dispatch.

use std::fmt::Debug;

use reqwest::{Client, Method, RequestBuilder, Response, header};
use serde::Deserialize;

pub mod app;
pub mod dispatch;

/// The public GitHub REST API.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// The REST API version pinned on every request.
pub const API_VERSION: &str = "2022-11-28";

/// A GitHub REST API endpoint root and the HTTP client used to reach it.
#[derive(Debug, Clone)]
pub struct GitHubApi {
    client: Client,
    base_url: String,
}

impl GitHubApi {
    /// Creates a [`GitHubApi`] rooted at `base_url`, such as [`DEFAULT_API_URL`] or a GitHub Enterprise API root.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    /// Returns the absolute URL of `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Builds a request for GitHub REST API, authenticated with the bearer `token`.
    pub fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(header::ACCEPT, "application/vnd.github+json")
            .bearer_auth(token)
            .header("X-GitHub-Api-Version", API_VERSION)
    }
}

/// Represents an installation of a GitHub App from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct Installation {
    pub id: u64,
    pub account: Option<Account>,
}

/// Represents the account a GitHub App is installed on.
#[derive(Debug, Deserialize, Clone)]
pub struct Account {
    pub login: String,
}

/// Represents an installation access token from GitHub REST API.
#[derive(Deserialize, Clone)]
pub struct InstallationToken {
    pub token: String,
    pub expires_at: Option<String>,
}

impl Debug for InstallationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Reads the body of a non-success response for diagnostics, returning `status: body`.
async fn describe_failure(response: Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) if !body.trim().is_empty() => format!("{status}: {}", body.trim()),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_onto_the_base_url() {
        let api = GitHubApi::new(Client::new(), "https://github.example.com/api/v3/");
        assert_eq!(
            api.url("/app/installations"),
            "https://github.example.com/api/v3/app/installations"
        );
        assert_eq!(
            GitHubApi::new(Client::new(), DEFAULT_API_URL).url("app/installations"),
            "https://api.github.com/app/installations"
        );
    }

    #[test]
    fn request_carries_github_headers() {
        let api = GitHubApi::new(Client::new(), DEFAULT_API_URL);
        let request = api
            .request(Method::GET, "/app/installations", "secret")
            .build()
            .unwrap();

        let headers = request.headers();
        assert_eq!(headers[header::ACCEPT], "application/vnd.github+json");
        assert_eq!(headers[header::AUTHORIZATION], "Bearer secret");
        assert_eq!(headers["X-GitHub-Api-Version"], API_VERSION);
    }

    #[test]
    fn parses_installations() {
        let json = r#"[
            {"id": 1, "account": {"login": "CalebSargeant", "id": 7}, "app_id": 12345, "target_type": "User"},
            {"id": 2, "account": null}
        ]"#;
        let installations: Vec<Installation> = serde_json::from_str(json).unwrap();
        assert_eq!(installations.len(), 2);
        assert_eq!(installations[0].id, 1);
        assert_eq!(
            installations[0].account.as_ref().map(|a| a.login.as_str()),
            Some("CalebSargeant")
        );
        assert!(installations[1].account.is_none());
    }

    #[test]
    fn token_debug_is_redacted() {
        let token: InstallationToken = serde_json::from_str(
            r#"{"token": "ghs_abc", "expires_at": "2026-10-17T12:00:00Z", "permissions": {"actions": "write"}}"#,
        )
        .unwrap();
        assert_eq!(token.token, "ghs_abc");
        assert!(!format!("{token:?}").contains("ghs_abc"));
    }
}
