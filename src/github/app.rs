//! GitHub App authentication: a signed assertion exchanged for an installation access token.

use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    framework::{StateError, StateResult, describe_reqwest_error},
    github::{GitHubApi, Installation, InstallationToken, describe_failure},
};

/// How far in the past the assertion is issued, to tolerate clock drift against GitHub.
pub const CLOCK_SKEW: Duration = Duration::seconds(60);

/// How long the assertion stays valid. GitHub rejects anything longer than ten minutes.
pub const ASSERTION_LIFETIME: Duration = Duration::seconds(600);

/// Something that can produce a bearer token allowed to dispatch workflows.
pub trait TokenMinter {
    /// Mints a fresh installation access token.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::CredentialDenied`] if signing, installation lookup, or the token exchange fails.
    fn mint_token(&self) -> impl Future<Output = StateResult<InstallationToken>> + Send;
}

/// The claims of a GitHub App assertion.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AppClaims {
    /// Issued at, in seconds since the Unix epoch.
    pub iat: i64,
    /// Expires at, in seconds since the Unix epoch.
    pub exp: i64,
    /// The GitHub App ID.
    pub iss: String,
}

impl AppClaims {
    /// Builds the claims for an assertion created at `now`.
    pub fn new(app_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            iat: (now - CLOCK_SKEW).timestamp(),
            exp: (now + ASSERTION_LIFETIME).timestamp(),
            iss: app_id.to_owned(),
        }
    }
}

/// An installed GitHub App, identified by its ID and private key.
#[derive(Clone)]
pub struct GitHubApp {
    api: GitHubApi,
    app_id: String,
    private_key: String,
}

impl Debug for GitHubApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubApp")
            .field("api", &self.api)
            .field("app_id", &self.app_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl GitHubApp {
    /// Creates a [`GitHubApp`]. The PEM-encoded RSA `private_key` is only parsed when an assertion is signed.
    pub fn new(api: GitHubApi, app_id: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            api,
            app_id: app_id.into(),
            private_key: private_key.into(),
        }
    }

    /// Returns the GitHub App ID.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Signs an RS256 assertion for this app, valid from one minute before `now` to ten minutes after it.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::CredentialDenied`] if the private key is not a valid RSA key.
    pub fn assertion(&self, now: DateTime<Utc>) -> StateResult<String> {
        debug!("generating GitHub App assertion…");

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|err| {
            error!("failed to load GitHub App private key: {err}");
            StateError::CredentialDenied(format!("invalid private key: {err}"))
        })?;

        let claims = AppClaims::new(&self.app_id, now);
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(|err| {
            error!("failed to sign GitHub App assertion: {err}");
            StateError::CredentialDenied(format!("signing failed: {err}"))
        })
    }

    /// Lists the installations of this app.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::CredentialDenied`] if GitHub rejects the assertion or the response cannot be parsed.
    pub async fn installations(&self, assertion: &str) -> StateResult<Vec<Installation>> {
        let url = self.api.url("app/installations");
        debug!("fetching installations from {url}…");

        let response = self
            .api
            .request(Method::GET, "app/installations", assertion)
            .send()
            .await
            .map_err(|err| {
                let detail = describe_reqwest_error(&err);
                error!("failed to fetch installations from {url}: {detail}");
                StateError::CredentialDenied(detail)
            })?;

        if !response.status().is_success() {
            let detail = describe_failure(response).await;
            error!("failed to fetch installations from {url}: {detail}");
            return Err(StateError::CredentialDenied(detail));
        }

        response.json::<Vec<Installation>>().await.map_err(|err| {
            let detail = describe_reqwest_error(&err);
            error!("failed to parse installations from {url}: {detail}");
            StateError::CredentialDenied(detail)
        })
    }

    /// Exchanges the assertion for an access token scoped to `installation_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::CredentialDenied`] if GitHub refuses the exchange or the response cannot be parsed.
    pub async fn access_token(
        &self,
        assertion: &str,
        installation_id: u64,
    ) -> StateResult<InstallationToken> {
        let path = format!("app/installations/{installation_id}/access_tokens");
        let url = self.api.url(&path);
        debug!("requesting installation token from {url}…");

        let response = self
            .api
            .request(Method::POST, &path, assertion)
            .send()
            .await
            .map_err(|err| {
                let detail = describe_reqwest_error(&err);
                error!("failed to get installation token from {url}: {detail}");
                StateError::CredentialDenied(detail)
            })?;

        if !response.status().is_success() {
            let detail = describe_failure(response).await;
            error!("failed to get installation token from {url}: {detail}");
            return Err(StateError::CredentialDenied(detail));
        }

        response.json::<InstallationToken>().await.map_err(|err| {
            let detail = describe_reqwest_error(&err);
            error!("failed to parse installation token from {url}: {detail}");
            StateError::CredentialDenied(detail)
        })
    }
}

impl TokenMinter for GitHubApp {
    async fn mint_token(&self) -> StateResult<InstallationToken> {
        info!("getting GitHub App installation token…");
        let assertion = self.assertion(Utc::now())?;

        let installations = self.installations(&assertion).await?;
        let Some(installation) = installations.first() else {
            error!("no installations found for GitHub App {}", self.app_id);
            return Err(StateError::CredentialDenied(format!(
                "GitHub App {} has no installations",
                self.app_id
            )));
        };
        match &installation.account {
            Some(account) => debug!(
                "using installation {} on {}",
                installation.id, account.login
            ),
            None => debug!("using installation {}", installation.id),
        }

        let token = self.access_token(&assertion, installation.id).await?;
        info!("installation token obtained");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{framework::FailureKind, github::DEFAULT_API_URL, test_support::serve};

    use chrono::TimeZone as _;
    use jsonwebtoken::{DecodingKey, Validation};
    use reqwest::Client;

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/app-key.pem");
    const PUBLIC_KEY: &str = include_str!("../../tests/fixtures/app-key.pub.pem");

    fn app(api_url: &str, private_key: &str) -> GitHubApp {
        GitHubApp::new(GitHubApi::new(Client::new(), api_url), "12345", private_key)
    }

    #[test]
    fn claims_span_eleven_minutes() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let claims = AppClaims::new("12345", now);

        assert_eq!(claims.exp - claims.iat, 660);
        assert_eq!(claims.iat, now.timestamp() - 60);
        assert_eq!(claims.exp, now.timestamp() + 600);
        assert_eq!(claims.iss, "12345");
    }

    #[test]
    fn assertion_is_rs256_signed() {
        let now = Utc::now();
        let assertion = app(DEFAULT_API_URL, PRIVATE_KEY).assertion(now).unwrap();

        let header = jsonwebtoken::decode_header(&assertion).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&["12345"]);
        let data = jsonwebtoken::decode::<AppClaims>(
            &assertion,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(data.claims, AppClaims::new("12345", now));
        assert_eq!(data.claims.exp - data.claims.iat, 660);
    }

    #[test]
    fn invalid_key_is_denied() {
        let err = app(DEFAULT_API_URL, "dummy-key")
            .assertion(Utc::now())
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::CredentialDenied);
    }

    #[tokio::test]
    async fn unreachable_api_is_denied() {
        let err = app("http://127.0.0.1:1", PRIVATE_KEY)
            .mint_token()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::CredentialDenied);
    }

    #[tokio::test]
    async fn empty_installation_list_is_denied() {
        let (api_url, server) = serve(vec![("200 OK", "[]")]).await;

        let err = app(&api_url, PRIVATE_KEY).mint_token().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::CredentialDenied);
        assert!(err.detail().contains("no installations"), "{err}");

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /app/installations "));
        assert!(requests[0].to_ascii_lowercase().contains("authorization: bearer ey"));
    }

    #[tokio::test]
    async fn rejected_assertion_keeps_response_body() {
        let (api_url, _server) =
            serve(vec![("401 Unauthorized", r#"{"message":"Bad credentials"}"#)]).await;

        let err = app(&api_url, PRIVATE_KEY).mint_token().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::CredentialDenied);
        assert_eq!(
            err.detail(),
            r#"401 Unauthorized: {"message":"Bad credentials"}"#
        );
    }

    #[tokio::test]
    async fn refused_token_exchange_is_denied() {
        let (api_url, _server) = serve(vec![
            ("200 OK", r#"[{"id": 7}]"#),
            ("404 Not Found", r#"{"message":"Not Found"}"#),
        ])
        .await;

        let err = app(&api_url, PRIVATE_KEY).mint_token().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::CredentialDenied);
        assert!(err.detail().starts_with("404 Not Found"), "{err}");
    }

    #[tokio::test]
    async fn mints_token_for_first_installation() {
        let (api_url, server) = serve(vec![
            ("200 OK", r#"[{"id": 7, "account": {"login": "CalebSargeant"}}, {"id": 8}]"#),
            ("201 Created", r#"{"token": "ghs_minted", "expires_at": "2026-10-17T13:00:00Z"}"#),
        ])
        .await;

        let token = app(&api_url, PRIVATE_KEY).mint_token().await.unwrap();
        assert_eq!(token.token, "ghs_minted");

        let requests = server.await.unwrap();
        assert!(requests[1].starts_with("POST /app/installations/7/access_tokens "));
    }

    #[test]
    fn debug_hides_private_key() {
        let debug = format!("{:?}", app(DEFAULT_API_URL, PRIVATE_KEY));
        assert!(!debug.contains("PRIVATE KEY"));
        assert!(debug.contains("12345"));
    }
}
