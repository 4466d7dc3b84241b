//! API version of the client-side capability set.
//!
//! This describes what the client was built against. It says nothing about
//! the version of the hosting runtime, only which capabilities could exist.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Version of the capability set shipped with this build.
pub const API_VERSION: ApiVersion = ApiVersion::new(1, 0, 0);

/// `MAJOR.MINOR.PATCH` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ApiVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether a runtime that implements `self` can serve a client built
    /// against `client`: same major, and at least the client's minor.
    pub fn serves(&self, client: &ApiVersion) -> bool {
        self.major == client.major && self.minor >= client.minor
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Error returned when a version string is not `MAJOR.MINOR.PATCH`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid API version '{0}': expected MAJOR.MINOR.PATCH")]
pub struct ParseVersionError(String);

impl FromStr for ApiVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError(s.to_string());
        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u32, ParseVersionError> {
            parts.next().ok_or_else(err)?.parse().map_err(|_| err())
        };
        let version = ApiVersion::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(version)
    }
}
