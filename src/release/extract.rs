use regex::Regex;
use tracing::warn;

use crate::{static_lazy_lock, version::Version};

static_lazy_lock! {
    /// Matches CHR archive names such as `chr-7.20.2.img.zip` or `chr-7.21beta1.img.zip`, capturing the version.
    CHR_ARCHIVE: Regex = Regex::new(r"chr-(\d+\.\d+(?:\.\d+)?(?i:beta\d*|rc\d*)?)\.img\.zip")
        .expect("unreachable");
}

/// The outcome of scanning a page for CHR versions.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// At least one stable version was found; this is the newest of them.
    Stable(Version),
    /// Only pre-release versions were found; this is the newest of them.
    PreReleaseOnly(Version),
    /// No CHR archive was found at all.
    NotFound,
}

impl Extraction {
    /// Returns the selected version, if any was found.
    pub fn version(&self) -> Option<&Version> {
        match self {
            Self::Stable(version) | Self::PreReleaseOnly(version) => Some(version),
            Self::NotFound => None,
        }
    }

    /// Converts into the selected version, if any was found.
    pub fn into_version(self) -> Option<Version> {
        match self {
            Self::Stable(version) | Self::PreReleaseOnly(version) => Some(version),
            Self::NotFound => None,
        }
    }
}

/// Collects every CHR version mentioned in `text`, in order of appearance.
pub fn find_versions(text: &str) -> Vec<Version> {
    CHR_ARCHIVE
        .captures_iter(text)
        .filter_map(|captures| {
            let token = captures.get(1)?.as_str();
            match token.parse::<Version>() {
                Ok(version) => Some(version),
                Err(err) => {
                    warn!("skipping unparsable CHR version {token:?}: {err}");
                    None
                }
            }
        })
        .collect()
}

/// Picks the latest version from the CHR archives mentioned in `text`.
///
/// Stable versions are preferred. If every match is a beta or a release candidate, the newest pre-release is returned
/// instead of nothing.
pub fn extract_latest(text: &str) -> Extraction {
    let all = find_versions(text);
    if all.is_empty() {
        return Extraction::NotFound;
    }

    let (stable, pre_releases): (Vec<Version>, Vec<Version>) =
        all.into_iter().partition(Version::is_stable);

    if let Some(latest) = stable.into_iter().max() {
        Extraction::Stable(latest)
    } else {
        warn!("no stable versions found, using all matches");
        pre_releases
            .into_iter()
            .max()
            .map_or(Extraction::NotFound, Extraction::PreReleaseOnly)
    }
}
