//! Gold targets, the builders that produce them, and which sources feed them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A gold table. Declaration order is the tie-break order used when
/// several targets are ready at once.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GoldTarget {
    DimProject,
    DimOrganization,
    FactFunding,
    DimTime,
    DimCountry,
    DimProgram,
    BridgeProjectProgram,
    DimTopic,
    BridgeProjectTopic,
    DimStatus,
    BridgeProjectStatus,
}

impl GoldTarget {
    pub const ALL: [GoldTarget; 11] = [
        GoldTarget::DimProject,
        GoldTarget::DimOrganization,
        GoldTarget::FactFunding,
        GoldTarget::DimTime,
        GoldTarget::DimCountry,
        GoldTarget::DimProgram,
        GoldTarget::BridgeProjectProgram,
        GoldTarget::DimTopic,
        GoldTarget::BridgeProjectTopic,
        GoldTarget::DimStatus,
        GoldTarget::BridgeProjectStatus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GoldTarget::DimProject => "dim_project",
            GoldTarget::DimOrganization => "dim_organization",
            GoldTarget::FactFunding => "fact_funding",
            GoldTarget::DimTime => "dim_time",
            GoldTarget::DimCountry => "dim_country",
            GoldTarget::DimProgram => "dim_program",
            GoldTarget::BridgeProjectProgram => "bridge_project_program",
            GoldTarget::DimTopic => "dim_topic",
            GoldTarget::BridgeProjectTopic => "bridge_project_topic",
            GoldTarget::DimStatus => "dim_status",
            GoldTarget::BridgeProjectStatus => "bridge_project_status",
        }
    }

    /// Builder responsible for this target
    pub fn builder(self) -> Builder {
        // BUILDER_TABLE is indexed by discriminant
        BUILDER_TABLE[self as usize].1
    }
}

impl fmt::Display for GoldTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GoldTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GoldTarget::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown gold target '{}'", s))
    }
}

/// A unit of gold work. Group builders write a dimension and its bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Builder {
    Project,
    Organization,
    FactFunding,
    Time,
    Country,
    ProgramGroup,
    TopicGroup,
    StatusGroup,
}

impl Builder {
    pub fn name(self) -> &'static str {
        match self {
            Builder::Project => "dim_project",
            Builder::Organization => "dim_organization",
            Builder::FactFunding => "fact_funding",
            Builder::Time => "dim_time",
            Builder::Country => "dim_country",
            Builder::ProgramGroup => "dim_program/bridge",
            Builder::TopicGroup => "dim_topic/bridge",
            Builder::StatusGroup => "dim_status/bridge",
        }
    }

    /// Targets written by one run of this builder
    pub fn targets(self) -> Vec<GoldTarget> {
        BUILDER_TABLE
            .iter()
            .filter(|(_, b)| *b == self)
            .map(|(t, _)| *t)
            .collect()
    }
}

/// target → builder
pub const BUILDER_TABLE: [(GoldTarget, Builder); 11] = [
    (GoldTarget::DimProject, Builder::Project),
    (GoldTarget::DimOrganization, Builder::Organization),
    (GoldTarget::FactFunding, Builder::FactFunding),
    (GoldTarget::DimTime, Builder::Time),
    (GoldTarget::DimCountry, Builder::Country),
    (GoldTarget::DimProgram, Builder::ProgramGroup),
    (GoldTarget::BridgeProjectProgram, Builder::ProgramGroup),
    (GoldTarget::DimTopic, Builder::TopicGroup),
    (GoldTarget::BridgeProjectTopic, Builder::TopicGroup),
    (GoldTarget::DimStatus, Builder::StatusGroup),
    (GoldTarget::BridgeProjectStatus, Builder::StatusGroup),
];

/// source → gold targets that must be rebuilt when it changes
pub const SOURCE_TARGETS: &[(&str, &[GoldTarget])] = &[
    (
        "projects",
        &[
            GoldTarget::DimProject,
            GoldTarget::DimTime,
            GoldTarget::DimStatus,
            GoldTarget::BridgeProjectStatus,
            GoldTarget::FactFunding,
        ],
    ),
    (
        "organizations",
        &[
            GoldTarget::DimOrganization,
            GoldTarget::DimCountry,
            GoldTarget::FactFunding,
        ],
    ),
    (
        "topics",
        &[GoldTarget::DimTopic, GoldTarget::BridgeProjectTopic],
    ),
    (
        "legalBasis",
        &[GoldTarget::DimProgram, GoldTarget::BridgeProjectProgram],
    ),
];

pub fn targets_for_source(source: &str) -> &'static [GoldTarget] {
    SOURCE_TARGETS
        .iter()
        .find(|(s, _)| *s == source)
        .map(|(_, t)| *t)
        .unwrap_or(&[])
}

/// Union of targets for several sources, sorted and deduplicated
pub fn targets_for_sources<S: AsRef<str>>(sources: &[S]) -> Vec<GoldTarget> {
    let mut targets: Vec<GoldTarget> = sources
        .iter()
        .flat_map(|s| targets_for_source(s.as_ref()).iter().copied())
        .collect();
    targets.sort();
    targets.dedup();
    targets
}
