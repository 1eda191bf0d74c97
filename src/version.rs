//! RouterOS version identifiers and their ordering.

use std::{cmp::Ordering, fmt::Display, str::FromStr};

use thiserror::Error;

/// A pre-release tag appended to a version, such as `beta1` or `rc2`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreRelease {
    /// A beta build, with its sequence number.
    Beta(u64),
    /// A release candidate, with its sequence number.
    Rc(u64),
}

/// A RouterOS version identifier such as `7.20.2` or `7.21beta1`.
///
/// Versions order by their numeric components compared as integers from left to right, so `7.10.0` is newer than
/// `7.9.0`. A pre-release sorts below the release sharing its numeric components. The text the version was parsed
/// from is kept verbatim and is what gets stored and dispatched.
#[derive(Debug, Clone)]
pub struct Version {
    text: String,
    components: Vec<u64>,
    pre_release: Option<PreRelease>,
}

/// An error that occurs when parsing a [`Version`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseVersionError {
    /// The text does not consist of 2 or 3 dotted numeric components.
    #[error("expected 2 or 3 dotted numeric components in {0:?}")]
    Components(String),
    /// A component is not a number, or does not fit in a [`u64`].
    #[error("invalid numeric component {component:?} in {text:?}")]
    Number {
        /// The whole text being parsed.
        text: String,
        /// The offending component.
        component: String,
    },
    /// The suffix after the numeric components is not a known pre-release tag.
    #[error("unknown pre-release tag {tag:?} in {text:?}")]
    PreRelease {
        /// The whole text being parsed.
        text: String,
        /// The offending suffix.
        tag: String,
    },
}

impl Version {
    /// Returns the text this version was parsed from.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns the numeric components, most significant first.
    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// Returns the pre-release tag, if any.
    pub fn pre_release(&self) -> Option<PreRelease> {
        self.pre_release
    }

    /// Checks if this version is a stable release, that is, neither a beta nor a release candidate.
    pub fn is_stable(&self) -> bool {
        let lowercase = self.text.to_ascii_lowercase();
        !lowercase.contains("beta") && !lowercase.contains("rc")
    }
}

fn parse_pre_release(text: &str, tag: &str) -> Result<PreRelease, ParseVersionError> {
    let lowercase = tag.to_ascii_lowercase();
    let (constructor, number): (fn(u64) -> PreRelease, &str) =
        if let Some(number) = lowercase.strip_prefix("beta") {
            (PreRelease::Beta, number)
        } else if let Some(number) = lowercase.strip_prefix("rc") {
            (PreRelease::Rc, number)
        } else {
            return Err(ParseVersionError::PreRelease {
                text: text.to_owned(),
                tag: tag.to_owned(),
            });
        };

    match number {
        "" => Ok(constructor(0)),
        number => number
            .parse()
            .map(constructor)
            .map_err(|_| ParseVersionError::PreRelease {
                text: text.to_owned(),
                tag: tag.to_owned(),
            }),
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        // The pre-release tag starts at the first alphabetic character, as in `7.21beta1`
        let (numeric, tag) = match text.find(|c: char| c.is_ascii_alphabetic()) {
            Some(index) => (&text[..index], Some(&text[index..])),
            None => (text, None),
        };

        let parts: Vec<&str> = numeric.split('.').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(ParseVersionError::Components(text.to_owned()));
        }

        let components = parts
            .iter()
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ParseVersionError::Number {
                        text: text.to_owned(),
                        component: (*part).to_owned(),
                    });
                }
                part.parse::<u64>().map_err(|_| ParseVersionError::Number {
                    text: text.to_owned(),
                    component: (*part).to_owned(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pre_release = tag.map(|tag| parse_pre_release(text, tag)).transpose()?;

        Ok(Self {
            text: text.to_owned(),
            components,
            pre_release,
        })
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components
            .cmp(&other.components)
            .then_with(|| match (&self.pre_release, &other.pre_release) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}
