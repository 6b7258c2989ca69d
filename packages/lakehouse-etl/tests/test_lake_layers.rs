//! Integration tests for bronze → silver → gold
//!
//! - Byte-identical silver on repeated runs
//! - Natural-key dedup
//! - Selective bronze and gold scope

use lakehouse_etl::features::gold::targets_for_sources;
use lakehouse_etl::{BronzeTransformer, GoldBuilder, GoldTarget, OutputOutcome, Value};
use std::path::Path;
use tempfile::TempDir;

const PROJECT_CSV: &str = "\
id;acronym;title;abstract;startDate;endDate;totalCost;ecMaxContribution;status;keywords;Unnamed: 10
101;ALPHA;Alpha project;Studies alpha;2021-01-01;2021-12-31;1000,50;900;SIGNED;alpha;
101;ALPHA;Alpha duplicate;dup;2022-01-01;2022-12-31;1;1;CLOSED;dup;
102;BETA;Beta project;Studies beta;15/03/2020;2020-06-15 00:00:00;2000;1500;CLOSED;beta;
";

const ORGANIZATION_CSV: &str = "\
projectId;organisationID;name;shortName;country;ecContribution;netEcContribution;role
101; 900;Acme;ACM;BE;500;450;coordinator
102;900;Acme;ACM;BE;100,5;90;participant
102;901;Beta Labs;BL;FR;200;180;participant
";

const TOPICS_CSV: &str = "\
projectID;topic;title
101;HORIZON-A;Topic A
102;HORIZON-B;Topic B
";

const LEGAL_BASIS_CSV: &str = "\
projectID,legalBasis,title,uniqueProgrammePart
101,HORIZON.1.1,Excellent science,true
102,HORIZON.2.5,Climate,true
";

struct Lake {
    dir: TempDir,
}

impl Lake {
    fn new() -> Self {
        let lake = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        std::fs::create_dir_all(lake.bronze()).unwrap();
        lake
    }

    fn with_all_sources() -> Self {
        let lake = Self::new();
        lake.put("project.csv", PROJECT_CSV);
        lake.put("organization.csv", ORGANIZATION_CSV);
        lake.put("topics.csv", TOPICS_CSV);
        lake.put("legalBasis.csv", LEGAL_BASIS_CSV);
        lake
    }

    fn bronze(&self) -> std::path::PathBuf {
        self.dir.path().join("bronze")
    }

    fn silver(&self) -> std::path::PathBuf {
        self.dir.path().join("silver")
    }

    fn gold(&self) -> std::path::PathBuf {
        self.dir.path().join("gold")
    }

    fn put(&self, name: &str, content: &str) {
        std::fs::write(self.bronze().join(name), content).unwrap();
    }

    fn bronze_stage(&self) -> BronzeTransformer {
        BronzeTransformer::new(self.bronze(), self.silver())
    }

    fn gold_stage(&self) -> GoldBuilder {
        GoldBuilder::new(self.silver(), self.gold()).unwrap()
    }
}

fn read_bytes(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

#[test]
fn test_bronze_rerun_is_byte_identical() {
    let lake = Lake::with_all_sources();
    let stage = lake.bronze_stage();

    stage.run_all().unwrap();
    let first: Vec<Vec<u8>> = ["project", "organizations_info", "organizations_project", "topics"]
        .iter()
        .map(|n| read_bytes(&stage.silver().path(n)))
        .collect();

    stage.run_all().unwrap();
    let second: Vec<Vec<u8>> = ["project", "organizations_info", "organizations_project", "topics"]
        .iter()
        .map(|n| read_bytes(&stage.silver().path(n)))
        .collect();

    assert_eq!(first, second);
}

#[test]
fn test_project_dedup_by_natural_key() {
    let lake = Lake::with_all_sources();
    let stage = lake.bronze_stage();
    let report = stage.run_files(&["project.csv"]).unwrap();

    assert_eq!(
        report.outcome("project"),
        Some(OutputOutcome::Written { rows: 2 })
    );
    let project = stage.silver().read("project").unwrap().unwrap();
    let hits: Vec<_> = project
        .column_values("projectID")
        .into_iter()
        .filter(|v| *v == Value::str("101"))
        .collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(project.value(0, "title"), Some(&Value::str("Alpha project")));
    assert!(!project.has_column("Unnamed: 10"));
    assert_eq!(project.value(0, "totalCost"), Some(&Value::Float(1000.5)));
}

#[test]
fn test_comma_file_falls_back() {
    let lake = Lake::with_all_sources();
    let stage = lake.bronze_stage();
    stage.run_files(&["legalBasis.csv"]).unwrap();
    let legal = stage.silver().read("legalBasis").unwrap().unwrap();
    assert_eq!(legal.len(), 2);
    assert!(legal.has_column("legalBasis"));
}

#[test]
fn test_selective_bronze_runs_only_named_handlers() {
    let lake = Lake::with_all_sources();
    let stage = lake.bronze_stage();
    let report = stage
        .run_files(&["organization.csv", "unknown.csv"])
        .unwrap();

    assert_eq!(report.unknown, vec!["unknown.csv".to_string()]);
    assert_eq!(
        report.written(),
        vec!["organizations_info", "organizations_project"]
    );
    assert!(!stage.silver().exists("project"));
}

#[test]
fn test_missing_raw_files_report_no_source() {
    let lake = Lake::new();
    let report = lake.bronze_stage().run_all().unwrap();
    assert!(report.written().is_empty());
    assert_eq!(report.outcome("webLink"), Some(OutputOutcome::NoSource));
}

#[test]
fn test_full_gold_build() {
    let lake = Lake::with_all_sources();
    lake.bronze_stage().run_all().unwrap();
    let gold = lake.gold_stage();
    let report = gold.run_all().unwrap();

    for target in GoldTarget::ALL {
        assert!(
            matches!(report.outcome(target.name()), Some(OutputOutcome::Written { .. })),
            "{} not written",
            target
        );
    }

    let fact = gold.gold().read("fact_funding").unwrap().unwrap();
    assert_eq!(fact.len(), 3);
    assert!(fact.has_column("year"));

    let country = gold.gold().read("dim_country").unwrap().unwrap();
    assert_eq!(country.column_values("country_key"), vec![Value::str("BE"), Value::str("FR")]);

    let program = gold.gold().read("dim_program").unwrap().unwrap();
    assert_eq!(program.columns(), &["program_id", "program_code", "program_name"]);
}

#[test]
fn test_gold_rerun_is_byte_identical() {
    let lake = Lake::with_all_sources();
    lake.bronze_stage().run_all().unwrap();
    let gold = lake.gold_stage();

    gold.run_all().unwrap();
    let first: Vec<Vec<u8>> = GoldTarget::ALL
        .iter()
        .map(|t| read_bytes(&gold.gold().path(t.name())))
        .collect();
    gold.run_all().unwrap();
    let second: Vec<Vec<u8>> = GoldTarget::ALL
        .iter()
        .map(|t| read_bytes(&gold.gold().path(t.name())))
        .collect();
    assert_eq!(first, second);
}

#[test]
fn test_selective_gold_builds_only_organization_targets() {
    let lake = Lake::with_all_sources();
    lake.bronze_stage().run_files(&["organization.csv"]).unwrap();
    let gold = lake.gold_stage();

    let targets = targets_for_sources(&["organizations"]);
    let report = gold.run_targets(&targets).unwrap();

    let touched: Vec<&str> = report.outputs.iter().map(|o| o.output.as_str()).collect();
    assert_eq!(touched, vec!["dim_organization", "fact_funding", "dim_country"]);
    assert!(gold.gold().exists("dim_organization"));
    assert!(gold.gold().exists("dim_country"));
    assert!(!gold.gold().exists("dim_project"));
    assert!(!gold.gold().exists("dim_topic"));
}

#[test]
fn test_selective_gold_reads_unselected_dependency_from_disk() {
    let lake = Lake::with_all_sources();
    lake.bronze_stage().run_all().unwrap();
    let gold = lake.gold_stage();
    gold.run_all().unwrap();
    let before = read_bytes(&gold.gold().path("dim_project"));

    let report = gold.run_targets(&[GoldTarget::DimTime]).unwrap();
    assert_eq!(report.outputs.len(), 1);
    assert_eq!(read_bytes(&gold.gold().path("dim_project")), before);
}
