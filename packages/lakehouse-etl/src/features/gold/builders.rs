//! Gold builders
//!
//! Each builder is a pure function of silver snapshots and gold tables
//! already on disk. A builder returns one entry per target it owns; `None`
//! means the inputs were missing and nothing should be written.

use super::keys;
use super::targets::{Builder, GoldTarget};
use crate::config::SurrogateKeys;
use crate::errors::Result;
use crate::shared::coerce::{to_date, to_trimmed_text};
use crate::shared::frame::{Frame, Value};
use crate::shared::snapshot::SnapshotStore;
use chrono::{Datelike, NaiveDate};
use tracing::debug;

pub type BuildOutput = Vec<(GoldTarget, Option<Frame>)>;

const DIM_PROJECT_COLUMNS: &[&str] = &[
    "projectID",
    "acronym",
    "title",
    "abstract",
    "startDate",
    "endDate",
    "duration_days",
    "totalCost",
    "ecMaxContribution",
    "country",
    "status",
    "year",
];

const DIM_ORGANIZATION_COLUMNS: &[&str] = &[
    "org_sk",
    "organisationID",
    "name",
    "shortName",
    "country",
    "vatNumber",
    "street",
    "postCode",
    "city",
    "organizationURL",
    "nutsCode",
    "geolocation",
];

const FUNDING_METRICS: &[&str] = &["ecContribution", "netEcContribution", "totalCost"];

/// Inputs shared by every builder
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub silver: &'a SnapshotStore,
    pub gold: &'a SnapshotStore,
    pub keys: SurrogateKeys,
}

/// Run one builder
pub fn run_builder(builder: Builder, ctx: &BuildContext<'_>) -> Result<BuildOutput> {
    match builder {
        Builder::Project => build_dim_project(ctx),
        Builder::Organization => build_dim_organization(ctx),
        Builder::FactFunding => build_fact_funding(ctx),
        Builder::Time => build_dim_time(ctx),
        Builder::Country => build_dim_country(ctx),
        Builder::ProgramGroup => build_code_dimension(&PROGRAM, ctx),
        Builder::TopicGroup => build_code_dimension(&TOPIC, ctx),
        Builder::StatusGroup => build_status(ctx),
    }
}

fn nothing(builder: Builder) -> Result<BuildOutput> {
    Ok(builder.targets().into_iter().map(|t| (t, None)).collect())
}

/// Normalize the project id column to a trimmed `projectID`
fn norm_project_id(frame: Frame) -> Frame {
    frame
        .rename("id", "projectID")
        .rename("projectId", "projectID")
        .map_column("projectID", to_trimmed_text)
}

fn first_present(frame: &Frame, candidates: &[&'static str]) -> Option<&'static str> {
    candidates.iter().copied().find(|c| frame.has_column(c))
}

fn build_dim_project(ctx: &BuildContext<'_>) -> Result<BuildOutput> {
    let project = ctx.silver.read_or_empty("project")?;
    if project.is_empty() {
        return nothing(Builder::Project);
    }

    let mut d = project
        .map_column("startDate", to_date)
        .map_column("endDate", to_date);
    if !d.has_column("year") {
        d = d.with_column("year", |f, i| {
            f.value(i, "startDate")
                .and_then(Value::as_date)
                .map(|s| Value::Int(i64::from(s.year())))
                .unwrap_or(Value::Null)
        });
    }

    let d = d.select(DIM_PROJECT_COLUMNS).dedup();
    Ok(vec![(GoldTarget::DimProject, Some(d))])
}

fn build_dim_organization(ctx: &BuildContext<'_>) -> Result<BuildOutput> {
    let info = ctx.silver.read_or_empty("organizations_info")?;
    let relation = ctx.silver.read_or_empty("organizations_project")?;
    if info.is_empty() && relation.is_empty() {
        return nothing(Builder::Organization);
    }

    let base = if info.is_empty() {
        relation.select(&["organisationID"])
    } else {
        info
    };
    let base = base.map_column("organisationID", to_trimmed_text).dedup();
    let base = if base.has_column("organisationID") {
        base.dedup_by(&["organisationID"])
    } else {
        base
    };

    let base = match ctx.keys {
        SurrogateKeys::Ordinal => base.with_column("org_sk", |_, i| Value::Int(i as i64 + 1)),
        SurrogateKeys::StableHash => keys::assign(ctx.keys, base, "organisationID", "org_sk"),
    };
    let d = base.select(DIM_ORGANIZATION_COLUMNS).dedup();
    Ok(vec![(GoldTarget::DimOrganization, Some(d))])
}

fn build_fact_funding(ctx: &BuildContext<'_>) -> Result<BuildOutput> {
    let relation = ctx.silver.read_or_empty("organizations_project")?;
    let dim_org = ctx.gold.read_or_empty(GoldTarget::DimOrganization.name())?;
    if relation.is_empty() || dim_org.is_empty() {
        return nothing(Builder::FactFunding);
    }

    let df = norm_project_id(relation)
        .map_column("organisationID", to_trimmed_text)
        .left_join(&dim_org, "organisationID", &["org_sk"]);

    let mut keep = vec!["projectID", "org_sk"];
    keep.extend(FUNDING_METRICS.iter().filter(|m| df.has_column(m)));
    let mut fact = df.select(&keep).drop_nulls(&["projectID", "org_sk"]).dedup();

    let dim_project = ctx.gold.read_or_empty(GoldTarget::DimProject.name())?;
    if dim_project.has_column("projectID") && dim_project.has_column("year") {
        let years = dim_project.select(&["projectID", "year"]);
        fact = fact.left_join(&years, "projectID", &["year"]);
    }
    Ok(vec![(GoldTarget::FactFunding, Some(fact))])
}

fn build_dim_time(ctx: &BuildContext<'_>) -> Result<BuildOutput> {
    let dim_project = ctx.gold.read_or_empty(GoldTarget::DimProject.name())?;
    if dim_project.is_empty() || !dim_project.has_column("startDate") {
        return nothing(Builder::Time);
    }

    let mut dates: Vec<NaiveDate> = dim_project
        .column_values("startDate")
        .iter()
        .chain(dim_project.column_values("endDate").iter())
        .filter_map(|v| to_date(v).as_date())
        .collect();
    dates.sort();
    dates.dedup();
    if dates.is_empty() {
        debug!("[dim_time] no dates");
        return nothing(Builder::Time);
    }

    let columns = [
        "date",
        "date_key",
        "year",
        "quarter",
        "month",
        "month_name",
        "week",
        "dow",
    ];
    let rows = dates
        .into_iter()
        .map(|d| {
            vec![
                Value::Date(d),
                Value::Int(i64::from(d.year()) * 10_000 + i64::from(d.month() * 100 + d.day())),
                Value::Int(i64::from(d.year())),
                Value::Int(i64::from((d.month() - 1) / 3 + 1)),
                Value::Int(i64::from(d.month())),
                Value::str(d.format("%B").to_string()),
                Value::Int(i64::from(d.iso_week().week())),
                Value::Int(i64::from(d.weekday().number_from_monday())),
            ]
        })
        .collect();
    let t = Frame::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows);
    Ok(vec![(GoldTarget::DimTime, Some(t))])
}

/// Upper-case, whitespace runs collapsed to `_`
pub fn country_key(country: &str) -> String {
    let mut out = String::with_capacity(country.len());
    let mut in_space = false;
    for ch in country.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.extend(ch.to_uppercase());
            in_space = false;
        }
    }
    out
}

fn build_dim_country(ctx: &BuildContext<'_>) -> Result<BuildOutput> {
    let dim_org = ctx.gold.read_or_empty(GoldTarget::DimOrganization.name())?;
    if dim_org.is_empty() || !dim_org.has_column("country") {
        return nothing(Builder::Country);
    }

    let d = dim_org
        .select(&["country"])
        .drop_nulls(&["country"])
        .dedup()
        .with_column("country_key", |f, i| {
            Value::str(country_key(
                &f.value(i, "country").map(Value::to_text).unwrap_or_default(),
            ))
        })
        .select(&["country_key", "country"]);
    Ok(vec![(GoldTarget::DimCountry, Some(d))])
}

/// A coded dimension read from one silver dataset, with its bridge table
struct CodeDimension {
    builder: Builder,
    silver: &'static str,
    dim: GoldTarget,
    bridge: GoldTarget,
    code_candidates: &'static [&'static str],
    label_candidates: &'static [&'static str],
    id_column: &'static str,
    code_column: &'static str,
    name_column: &'static str,
}

const TOPIC: CodeDimension = CodeDimension {
    builder: Builder::TopicGroup,
    silver: "topics",
    dim: GoldTarget::DimTopic,
    bridge: GoldTarget::BridgeProjectTopic,
    code_candidates: &["topicCode", "topic", "code", "id"],
    label_candidates: &["topicName", "name", "title", "label", "description"],
    id_column: "topic_id",
    code_column: "topic_code",
    name_column: "topic_name",
};

const PROGRAM: CodeDimension = CodeDimension {
    builder: Builder::ProgramGroup,
    silver: "legalBasis",
    dim: GoldTarget::DimProgram,
    bridge: GoldTarget::BridgeProjectProgram,
    code_candidates: &["legalBasis", "code", "id"],
    label_candidates: &["name", "title", "label", "description"],
    id_column: "program_id",
    code_column: "program_code",
    name_column: "program_name",
};

fn build_code_dimension(def: &CodeDimension, ctx: &BuildContext<'_>) -> Result<BuildOutput> {
    let raw = ctx.silver.read_or_empty(def.silver)?;
    if raw.is_empty() {
        return nothing(def.builder);
    }
    let src = norm_project_id(raw);
    if !src.has_column("projectID") {
        debug!("[{}] no projectID column", def.builder.name());
        return nothing(def.builder);
    }
    let Some(code) = first_present(&src, def.code_candidates) else {
        debug!("[{}] no code column", def.builder.name());
        return nothing(def.builder);
    };
    let label = first_present(&src, def.label_candidates).filter(|l| *l != code);

    let mut dim_cols = vec![code];
    dim_cols.extend(label);
    let mut dim = src
        .select(&dim_cols)
        .drop_nulls(&[code])
        .dedup()
        .rename(code, def.code_column);
    if let Some(label) = label {
        dim = dim.rename(label, def.name_column);
    }
    let dim = keys::assign(
        ctx.keys,
        dim.dedup_by(&[def.code_column]),
        def.code_column,
        def.id_column,
    );
    let dim = dim.select(&[def.id_column, def.code_column, def.name_column]);

    let bridge = src
        .select(&["projectID", code])
        .drop_nulls(&["projectID", code])
        .dedup()
        .rename(code, def.code_column)
        .left_join(&dim, def.code_column, &[def.id_column])
        .select(&["projectID", def.id_column])
        .drop_nulls(&["projectID", def.id_column])
        .dedup();

    Ok(vec![(def.dim, Some(dim)), (def.bridge, Some(bridge))])
}

fn build_status(ctx: &BuildContext<'_>) -> Result<BuildOutput> {
    let dim_project = ctx.gold.read_or_empty(GoldTarget::DimProject.name())?;
    if dim_project.is_empty() || !dim_project.has_column("status") {
        return nothing(Builder::StatusGroup);
    }

    let statuses = dim_project
        .select(&["status"])
        .drop_nulls(&["status"])
        .dedup();
    if statuses.is_empty() {
        return nothing(Builder::StatusGroup);
    }
    let dim = keys::assign(ctx.keys, statuses, "status", "status_id");

    let bridge = dim_project
        .select(&["projectID", "status"])
        .left_join(&dim, "status", &["status_id"])
        .select(&["projectID", "status_id"])
        .drop_nulls(&["projectID", "status_id"])
        .dedup();

    let dim = dim
        .rename("status", "status_name")
        .select(&["status_id", "status_name"]);
    Ok(vec![
        (GoldTarget::DimStatus, Some(dim)),
        (GoldTarget::BridgeProjectStatus, Some(bridge)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(cols: &[&str], rows: Vec<Vec<Value>>) -> Frame {
        Frame::from_rows(cols.iter().map(|c| c.to_string()).collect(), rows)
    }

    struct Lake {
        _dir: tempfile::TempDir,
        silver: SnapshotStore,
        gold: SnapshotStore,
    }

    impl Lake {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            Self {
                silver: SnapshotStore::new(dir.path().join("silver")),
                gold: SnapshotStore::new(dir.path().join("gold")),
                _dir: dir,
            }
        }

        fn ctx(&self) -> BuildContext<'_> {
            BuildContext {
                silver: &self.silver,
                gold: &self.gold,
                keys: SurrogateKeys::Ordinal,
            }
        }
    }

    fn date(y: i32, m: u32, d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_country_key() {
        assert_eq!(country_key("United  Kingdom"), "UNITED_KINGDOM");
        assert_eq!(country_key("be"), "BE");
    }

    #[test]
    fn test_missing_inputs_produce_nothing() {
        let lake = Lake::new();
        for b in [Builder::Project, Builder::FactFunding, Builder::TopicGroup] {
            let out = run_builder(b, &lake.ctx()).unwrap();
            assert!(out.iter().all(|(_, f)| f.is_none()));
            assert_eq!(out.len(), b.targets().len());
        }
    }

    #[test]
    fn test_dim_project_derives_year() {
        let lake = Lake::new();
        lake.silver
            .write(
                "project",
                &frame(
                    &["projectID", "title", "startDate", "rcn"],
                    vec![vec!["1".into(), "T".into(), date(2019, 5, 1), "x".into()]],
                ),
            )
            .unwrap();
        let out = run_builder(Builder::Project, &lake.ctx()).unwrap();
        let d = out[0].1.as_ref().unwrap();
        assert_eq!(d.columns(), &["projectID", "title", "startDate", "year"]);
        assert_eq!(d.value(0, "year"), Some(&Value::Int(2019)));
    }

    #[test]
    fn test_dim_time_attributes() {
        let lake = Lake::new();
        lake.gold
            .write(
                "dim_project",
                &frame(
                    &["projectID", "startDate", "endDate"],
                    vec![
                        vec!["1".into(), date(2021, 1, 4), date(2021, 1, 4)],
                        vec!["2".into(), Value::Null, date(2020, 12, 31)],
                    ],
                ),
            )
            .unwrap();
        let out = run_builder(Builder::Time, &lake.ctx()).unwrap();
        let t = out[0].1.as_ref().unwrap();
        assert_eq!(t.len(), 2);
        // sorted ascending
        assert_eq!(t.value(0, "date_key"), Some(&Value::Int(20201231)));
        assert_eq!(t.value(0, "quarter"), Some(&Value::Int(4)));
        assert_eq!(t.value(0, "month_name"), Some(&Value::str("December")));
        assert_eq!(t.value(1, "week"), Some(&Value::Int(1)));
        assert_eq!(t.value(1, "dow"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_topic_dimension_and_bridge() {
        let lake = Lake::new();
        lake.silver
            .write(
                "topics",
                &frame(
                    &["projectID", "topic", "title"],
                    vec![
                        vec!["1".into(), "T-A".into(), "Alpha".into()],
                        vec!["2".into(), "T-B".into(), "Beta".into()],
                        vec!["2".into(), "T-A".into(), "Alpha again".into()],
                        vec![Value::Null, "T-C".into(), Value::Null],
                    ],
                ),
            )
            .unwrap();
        let out = run_builder(Builder::TopicGroup, &lake.ctx()).unwrap();
        let dim = out[0].1.as_ref().unwrap();
        let bridge = out[1].1.as_ref().unwrap();

        assert_eq!(dim.columns(), &["topic_id", "topic_code", "topic_name"]);
        assert_eq!(dim.len(), 3);
        assert_eq!(dim.value(0, "topic_name"), Some(&Value::str("Alpha")));
        assert_eq!(
            bridge.rows(),
            &[
                vec![Value::str("1"), Value::Int(1)],
                vec![Value::str("2"), Value::Int(2)],
                vec![Value::str("2"), Value::Int(1)],
            ]
        );
    }

    #[test]
    fn test_fact_funding_joins_keys_and_year() {
        let lake = Lake::new();
        lake.silver
            .write(
                "organizations_project",
                &frame(
                    &["projectID", "organisationID", "ecContribution"],
                    vec![
                        vec!["1".into(), "900".into(), Value::Float(10.5)],
                        vec!["1".into(), "unknown".into(), Value::Float(1.0)],
                    ],
                ),
            )
            .unwrap();
        lake.gold
            .write(
                "dim_organization",
                &frame(&["org_sk", "organisationID"], vec![vec![Value::Int(1), "900".into()]]),
            )
            .unwrap();
        lake.gold
            .write(
                "dim_project",
                &frame(&["projectID", "year"], vec![vec!["1".into(), Value::Int(2020)]]),
            )
            .unwrap();

        let out = run_builder(Builder::FactFunding, &lake.ctx()).unwrap();
        let f = out[0].1.as_ref().unwrap();
        assert_eq!(f.columns(), &["projectID", "org_sk", "ecContribution", "year"]);
        assert_eq!(
            f.rows(),
            &[vec![
                Value::str("1"),
                Value::Int(1),
                Value::Float(10.5),
                Value::Int(2020)
            ]]
        );
    }

    #[test]
    fn test_status_group() {
        let lake = Lake::new();
        lake.gold
            .write(
                "dim_project",
                &frame(
                    &["projectID", "status"],
                    vec![
                        vec!["1".into(), "SIGNED".into()],
                        vec!["2".into(), "CLOSED".into()],
                        vec!["3".into(), "SIGNED".into()],
                        vec!["4".into(), Value::Null],
                    ],
                ),
            )
            .unwrap();
        let out = run_builder(Builder::StatusGroup, &lake.ctx()).unwrap();
        let dim = out[0].1.as_ref().unwrap();
        let bridge = out[1].1.as_ref().unwrap();
        assert_eq!(dim.columns(), &["status_id", "status_name"]);
        assert_eq!(dim.len(), 2);
        assert_eq!(bridge.len(), 3);
        assert_eq!(bridge.value(2, "status_id"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_organization_dedups_by_id() {
        let lake = Lake::new();
        lake.silver
            .write(
                "organizations_info",
                &frame(
                    &["organisationID", "name", "country"],
                    vec![
                        vec!["900".into(), "Acme".into(), "BE".into()],
                        vec!["900".into(), "Acme SA".into(), "BE".into()],
                        vec!["901".into(), "Beta".into(), "FR".into()],
                    ],
                ),
            )
            .unwrap();
        let out = run_builder(Builder::Organization, &lake.ctx()).unwrap();
        let d = out[0].1.as_ref().unwrap();
        assert_eq!(d.columns(), &["org_sk", "organisationID", "name", "country"]);
        assert_eq!(d.len(), 2);
        assert_eq!(d.value(1, "org_sk"), Some(&Value::Int(2)));
    }
}
