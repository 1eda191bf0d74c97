//! The result type that controls the flow of a run.
//!
//! Every step of a run returns a [`StateResult`]. A [`StateError`] carries the failure category along with the
//! detail that was logged by the component that detected it, so the checker never has to re-derive it.

use thiserror::Error;

/// The result of a step in a run.
pub type StateResult<T> = Result<T, StateError>;

/// A failed step, categorized by what went wrong.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The download page could not be fetched: network failure, timeout, or a non-success status.
    #[error("source unreachable: {0}")]
    SourceUnreachable(String),
    /// The download page was fetched but no CHR archive was listed on it.
    #[error("no version found: {0}")]
    ExtractionEmpty(String),
    /// The version store could not be written.
    #[error("store unwritable: {0}")]
    StoreUnwritable(String),
    /// Signing the assertion, looking up the installation, or exchanging the token failed.
    #[error("credential denied: {0}")]
    CredentialDenied(String),
    /// GitHub did not accept the workflow dispatch.
    #[error("dispatch rejected: {0}")]
    DispatchRejected(String),
}

/// The category of a [`StateError`] without its detail.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// See [`StateError::SourceUnreachable`].
    SourceUnreachable,
    /// See [`StateError::ExtractionEmpty`].
    ExtractionEmpty,
    /// See [`StateError::StoreUnwritable`].
    StoreUnwritable,
    /// See [`StateError::CredentialDenied`].
    CredentialDenied,
    /// See [`StateError::DispatchRejected`].
    DispatchRejected,
}

impl StateError {
    /// Returns the category of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::SourceUnreachable(_) => FailureKind::SourceUnreachable,
            Self::ExtractionEmpty(_) => FailureKind::ExtractionEmpty,
            Self::StoreUnwritable(_) => FailureKind::StoreUnwritable,
            Self::CredentialDenied(_) => FailureKind::CredentialDenied,
            Self::DispatchRejected(_) => FailureKind::DispatchRejected,
        }
    }

    /// Returns the detail captured when the error was raised.
    pub fn detail(&self) -> &str {
        match self {
            Self::SourceUnreachable(detail)
            | Self::ExtractionEmpty(detail)
            | Self::StoreUnwritable(detail)
            | Self::CredentialDenied(detail)
            | Self::DispatchRejected(detail) => detail,
        }
    }
}

/// Formats a [`reqwest::Error`] together with its source chain, where causes like a refused connection live.
pub fn describe_reqwest_error(err: &reqwest::Error) -> String {
    use std::error::Error as _;

    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_detail_follow_variant() {
        let err = StateError::DispatchRejected(String::from("422 Unprocessable Entity"));
        assert_eq!(err.kind(), FailureKind::DispatchRejected);
        assert_eq!(err.detail(), "422 Unprocessable Entity");
        assert_eq!(
            err.to_string(),
            "dispatch rejected: 422 Unprocessable Entity"
        );
    }

    #[test]
    fn every_variant_has_a_distinct_kind() {
        let errors = [
            StateError::SourceUnreachable(String::new()),
            StateError::ExtractionEmpty(String::new()),
            StateError::StoreUnwritable(String::new()),
            StateError::CredentialDenied(String::new()),
            StateError::DispatchRejected(String::new()),
        ];
        let kinds: std::collections::HashSet<_> = errors.iter().map(StateError::kind).collect();
        assert_eq!(kinds.len(), errors.len());
    }
}
