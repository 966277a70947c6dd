//! GoCD server versions.
//!
//! The server reports versions like `18.2.0` plus a separate build number.
//! Only the numeric triple matters for feature gating, so parsing is lenient
//! about missing patch components and trailing build metadata.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A GoCD release, ordered by its numeric components only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GoVersion(semver::Version);

fn version_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*v?(\d+)\.(\d+)(?:\.(\d+))?(?:[-+ ].*)?\s*$").ok())
        .as_ref()
}

impl GoVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let caps = version_pattern()
            .and_then(|re| re.captures(raw))
            .ok_or_else(|| Error::version_invalid(raw))?;

        let part = |idx: usize| -> Result<u64> {
            match caps.get(idx) {
                Some(m) => m.as_str().parse().map_err(|_| Error::version_invalid(raw)),
                None => Ok(0),
            }
        };

        Ok(Self::new(part(1)?, part(2)?, part(3)?))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }
}

impl FromStr for GoVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for GoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for GoVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GoVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        GoVersion::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Payload of `GET /api/version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerVersion {
    pub version: String,
    pub build_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_url: Option<String>,
}

impl ServerVersion {
    /// `<version>-<build>`, the key used by addon_builds.json.
    pub fn core(&self) -> String {
        format!("{}-{}", self.version, self.build_number)
    }

    pub fn go_version(&self) -> Result<GoVersion> {
        GoVersion::parse(&self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_triples() {
        let v = GoVersion::parse("16.10.0").unwrap();
        assert_eq!((v.major(), v.minor(), v.patch()), (16, 10, 0));
    }

    #[test]
    fn missing_patch_defaults_to_zero() {
        assert_eq!(GoVersion::parse("18.2").unwrap(), GoVersion::new(18, 2, 0));
    }

    #[test]
    fn build_suffix_does_not_lower_the_version() {
        let with_build = GoVersion::parse("18.2.0-5678").unwrap();
        assert_eq!(with_build, GoVersion::new(18, 2, 0));
        assert!(with_build >= GoVersion::new(18, 2, 0));

        let full = GoVersion::parse("18.2.0 (5678-8a1f2b)").unwrap();
        assert_eq!(full, GoVersion::new(18, 2, 0));
    }

    #[test]
    fn orders_numerically_not_lexically() {
        assert!(GoVersion::parse("16.9.0").unwrap() < GoVersion::parse("16.10.0").unwrap());
        assert!(GoVersion::parse("17.12.0").unwrap() > GoVersion::parse("17.4.0").unwrap());
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["", "latest", "18", "a.b.c"] {
            let err = GoVersion::parse(raw).unwrap_err();
            assert_eq!(err.code.as_str(), "version.invalid", "input {:?}", raw);
        }
    }

    #[test]
    fn server_version_core_joins_build_number() {
        let payload: ServerVersion = serde_json::from_str(
            r#"{"version":"18.1.0","build_number":"5937","git_sha":"abc","full_version":"18.1.0 (5937-abc)"}"#,
        )
        .unwrap();
        assert_eq!(payload.core(), "18.1.0-5937");
        assert_eq!(payload.go_version().unwrap(), GoVersion::new(18, 1, 0));
    }

    #[test]
    fn deserializes_from_string() {
        let v: GoVersion = serde_json::from_str("\"17.5.0\"").unwrap();
        assert_eq!(v, GoVersion::new(17, 5, 0));
    }
}
