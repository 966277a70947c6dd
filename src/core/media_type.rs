//! Version-gated capability resolution.
//!
//! GoCD selects the schema of most API responses from the `Accept` header, and
//! the accepted media types moved between releases. Each endpoint gets an
//! ordered tier table; the highest threshold the server meets wins.

use crate::error::{Error, Result};
use crate::version::GoVersion;
use serde::Serialize;

pub const V1: &str = "application/vnd.go.cd.v1+json";
pub const V2: &str = "application/vnd.go.cd.v2+json";
pub const V3: &str = "application/vnd.go.cd.v3+json";
pub const V4: &str = "application/vnd.go.cd.v4+json";
pub const V5: &str = "application/vnd.go.cd.v5+json";
pub const TEXT_PLAIN: &str = "text/plain";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Version,
    Agents,
    PipelineConfig,
    Unpause,
    Schedule,
    Dashboard,
    AuthConfigs,
}

/// Tiers sorted by descending threshold, plus what applies below all of them.
struct TierTable {
    tiers: &'static [(GoVersion, &'static str)],
    floor: Option<&'static str>,
}

impl TierTable {
    fn resolve(&self, version: &GoVersion) -> Option<&'static str> {
        self.tiers
            .iter()
            .find(|(threshold, _)| version >= threshold)
            .map(|(_, media_type)| *media_type)
            .or(self.floor)
    }
}

static VERSION_TIERS: TierTable = TierTable {
    tiers: &[],
    floor: Some(V1),
};

static AGENT_TIERS: TierTable = TierTable {
    tiers: &[(GoVersion::new(16, 10, 0), V4)],
    floor: Some(V3),
};

static PIPELINE_CONFIG_TIERS: TierTable = TierTable {
    tiers: &[
        (GoVersion::new(17, 12, 0), V5),
        (GoVersion::new(17, 4, 0), V4),
        (GoVersion::new(16, 10, 0), V3),
        (GoVersion::new(16, 7, 0), V2),
    ],
    floor: Some(V1),
};

static UNPAUSE_TIERS: TierTable = TierTable {
    tiers: &[(GoVersion::new(18, 2, 0), V1)],
    floor: Some(TEXT_PLAIN),
};

static SCHEDULE_TIERS: TierTable = TierTable {
    tiers: &[(GoVersion::new(18, 2, 0), V1)],
    floor: Some(TEXT_PLAIN),
};

static DASHBOARD_TIERS: TierTable = TierTable {
    tiers: &[(GoVersion::new(15, 3, 0), V1)],
    floor: None,
};

static AUTH_CONFIG_TIERS: TierTable = TierTable {
    tiers: &[(GoVersion::new(17, 5, 0), V1)],
    floor: None,
};

impl Endpoint {
    pub const ALL: [Endpoint; 7] = [
        Endpoint::Version,
        Endpoint::Agents,
        Endpoint::PipelineConfig,
        Endpoint::Unpause,
        Endpoint::Schedule,
        Endpoint::Dashboard,
        Endpoint::AuthConfigs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Version => "version",
            Endpoint::Agents => "agents",
            Endpoint::PipelineConfig => "pipeline_config",
            Endpoint::Unpause => "unpause",
            Endpoint::Schedule => "schedule",
            Endpoint::Dashboard => "dashboard",
            Endpoint::AuthConfigs => "auth_configs",
        }
    }

    fn tiers(&self) -> &'static TierTable {
        match self {
            Endpoint::Version => &VERSION_TIERS,
            Endpoint::Agents => &AGENT_TIERS,
            Endpoint::PipelineConfig => &PIPELINE_CONFIG_TIERS,
            Endpoint::Unpause => &UNPAUSE_TIERS,
            Endpoint::Schedule => &SCHEDULE_TIERS,
            Endpoint::Dashboard => &DASHBOARD_TIERS,
            Endpoint::AuthConfigs => &AUTH_CONFIG_TIERS,
        }
    }
}

/// Media type to send as `Accept` for `endpoint`, or `None` if the server
/// predates the endpoint.
pub fn accept_for(endpoint: Endpoint, version: &GoVersion) -> Option<&'static str> {
    endpoint.tiers().resolve(version)
}

pub fn require_accept(endpoint: Endpoint, version: &GoVersion) -> Result<&'static str> {
    accept_for(endpoint, version).ok_or_else(|| {
        Error::version_unsupported(format!("The {} API", endpoint.as_str()), version.to_string())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Authorization,
    ElasticAgents,
    Analytics,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::Authorization, Feature::ElasticAgents, Feature::Analytics];

    pub fn minimum_version(&self) -> GoVersion {
        match self {
            Feature::Authorization => GoVersion::new(17, 5, 0),
            Feature::ElasticAgents | Feature::Analytics => GoVersion::new(18, 2, 0),
        }
    }

    pub fn is_supported(&self, version: &GoVersion) -> bool {
        *version >= self.minimum_version()
    }
}

/// Resolution table for one version, as shown by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub version: GoVersion,
    pub media_types: Vec<EndpointMediaType>,
    pub features: Vec<FeatureSupport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointMediaType {
    pub endpoint: Endpoint,
    pub accept: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureSupport {
    pub feature: Feature,
    pub supported: bool,
    pub minimum_version: GoVersion,
}

pub fn resolve_all(version: &GoVersion) -> Resolution {
    Resolution {
        version: version.clone(),
        media_types: Endpoint::ALL
            .iter()
            .map(|endpoint| EndpointMediaType {
                endpoint: *endpoint,
                accept: accept_for(*endpoint, version),
            })
            .collect(),
        features: Feature::ALL
            .iter()
            .map(|feature| FeatureSupport {
                feature: *feature,
                supported: feature.is_supported(version),
                minimum_version: feature.minimum_version(),
            })
            .collect(),
    }
}
