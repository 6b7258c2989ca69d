//! Dataset handlers: raw file → typed silver outputs
//!
//! The handler table is static. Each entry names its raw file, the logical
//! source it feeds, the silver outputs it may write, and a pure transform.

use crate::shared::coerce::{to_date, to_number, to_trimmed_text};
use crate::shared::frame::{Frame, Value};
use serde::Serialize;

/// Columns describing the organisation itself; the rest describe its
/// participation in a project.
pub const ORGANIZATION_INFO_COLUMNS: &[&str] = &[
    "organisationID",
    "vatNumber",
    "name",
    "shortName",
    "street",
    "postCode",
    "city",
    "country",
    "nutsCode",
    "geolocation",
    "organizationURL",
];

/// Logical raw dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Dataset {
    Projects,
    Organizations,
    Topics,
    LegalBasis,
    PolicyPriorities,
    EuroSciVoc,
    WebItem,
    WebLink,
}

impl Dataset {
    pub const ALL: [Dataset; 8] = [
        Dataset::Projects,
        Dataset::Organizations,
        Dataset::Topics,
        Dataset::LegalBasis,
        Dataset::PolicyPriorities,
        Dataset::EuroSciVoc,
        Dataset::WebItem,
        Dataset::WebLink,
    ];

    pub fn file_name(self) -> &'static str {
        self.handler().file_name
    }

    /// Source name used to resolve gold targets
    pub fn source(self) -> &'static str {
        self.handler().source
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        HANDLERS
            .iter()
            .find(|h| h.file_name == name)
            .map(|h| h.dataset)
    }

    pub fn handler(self) -> &'static DatasetHandler {
        // HANDLERS is indexed by discriminant
        &HANDLERS[self as usize]
    }
}

/// One silver output produced by a transform. `None` means the raw file had
/// nothing for this output.
pub type SilverOutputs = Vec<(&'static str, Option<Frame>)>;

pub struct DatasetHandler {
    pub dataset: Dataset,
    pub file_name: &'static str,
    pub source: &'static str,
    pub outputs: &'static [&'static str],
    pub transform: fn(Frame) -> SilverOutputs,
}

impl std::fmt::Debug for DatasetHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetHandler")
            .field("file_name", &self.file_name)
            .field("outputs", &self.outputs)
            .finish()
    }
}

pub static HANDLERS: [DatasetHandler; 8] = [
    DatasetHandler {
        dataset: Dataset::Projects,
        file_name: "project.csv",
        source: "projects",
        outputs: &["project"],
        transform: transform_projects,
    },
    DatasetHandler {
        dataset: Dataset::Organizations,
        file_name: "organization.csv",
        source: "organizations",
        outputs: &["organizations_info", "organizations_project"],
        transform: transform_organizations,
    },
    DatasetHandler {
        dataset: Dataset::Topics,
        file_name: "topics.csv",
        source: "topics",
        outputs: &["topics"],
        transform: |f| passthrough("topics", f),
    },
    DatasetHandler {
        dataset: Dataset::LegalBasis,
        file_name: "legalBasis.csv",
        source: "legalBasis",
        outputs: &["legalBasis"],
        transform: |f| passthrough("legalBasis", f),
    },
    DatasetHandler {
        dataset: Dataset::PolicyPriorities,
        file_name: "policyPriorities.csv",
        source: "policyPriorities",
        outputs: &["policyPriorities"],
        transform: |f| passthrough("policyPriorities", f),
    },
    DatasetHandler {
        dataset: Dataset::EuroSciVoc,
        file_name: "euroSciVoc.csv",
        source: "euroSciVoc",
        outputs: &["euroSciVoc"],
        transform: |f| passthrough("euroSciVoc", f),
    },
    DatasetHandler {
        dataset: Dataset::WebItem,
        file_name: "webItem.csv",
        source: "webItem",
        outputs: &["webItem"],
        transform: |f| passthrough("webItem", f),
    },
    DatasetHandler {
        dataset: Dataset::WebLink,
        file_name: "webLink.csv",
        source: "webLink",
        outputs: &["webLink"],
        transform: |f| passthrough("webLink", f),
    },
];

fn coerce_columns(mut frame: Frame, columns: &[&str], f: fn(&Value) -> Value) -> Frame {
    for c in columns {
        frame = frame.map_column(c, f);
    }
    frame
}

/// `project.csv` → `project`
pub fn transform_projects(raw: Frame) -> SilverOutputs {
    let mut df = raw.rename("id", "projectID").truncate_after("keywords");
    df = coerce_columns(df, &["startDate", "endDate"], to_date);
    df = coerce_columns(df, &["totalCost", "ecMaxContribution"], to_number);

    if df.has_column("startDate") && df.has_column("endDate") {
        df = df.with_column("duration_days", |f, i| {
            match (
                f.value(i, "startDate").and_then(Value::as_date),
                f.value(i, "endDate").and_then(Value::as_date),
            ) {
                (Some(start), Some(end)) => Value::Int((end - start).num_days()),
                _ => Value::Null,
            }
        });
    }

    let df = if df.has_column("projectID") {
        df.dedup().dedup_by(&["projectID"])
    } else {
        df.dedup()
    };
    vec![("project", Some(df))]
}

/// `organization.csv` → `organizations_info` + `organizations_project`
pub fn transform_organizations(raw: Frame) -> SilverOutputs {
    let info = raw.select(ORGANIZATION_INFO_COLUMNS);
    let info = if info.columns().is_empty() {
        None
    } else {
        let info = coerce_columns(info, &["country", "organisationID"], to_trimmed_text).dedup();
        Some(if info.has_column("organisationID") {
            info.dedup_by(&["organisationID"])
        } else {
            info
        })
    };

    let relation = raw
        .drop_columns(|c| c != "organisationID" && ORGANIZATION_INFO_COLUMNS.contains(&c))
        .rename("projectId", "projectID");
    let relation = coerce_columns(relation, &["organisationID"], to_trimmed_text);
    let relation = coerce_columns(
        relation,
        &["ecContribution", "netEcContribution", "totalCost"],
        to_number,
    );

    vec![
        ("organizations_info", info),
        ("organizations_project", Some(relation.dedup())),
    ]
}

/// Untyped datasets: columns as read, duplicate rows removed
pub fn passthrough(output: &'static str, raw: Frame) -> SilverOutputs {
    vec![(output, Some(raw.dedup()))]
}
