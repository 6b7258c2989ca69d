//! SQL text for gold tables: DDL, batch sizing and the index set

use lakehouse_etl::shared::ColumnType;

/// Gold tables in load order
pub const GOLD_TABLES: &[&str] = &[
    "dim_project",
    "dim_organization",
    "fact_funding",
    "dim_time",
    "dim_country",
    "dim_program",
    "bridge_project_program",
    "dim_topic",
    "bridge_project_topic",
    "dim_status",
    "bridge_project_status",
];

/// One secondary index on a gold table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static str,
    pub unique: bool,
}

const fn index(name: &'static str, table: &'static str, columns: &'static str) -> IndexDef {
    IndexDef {
        name,
        table,
        columns,
        unique: false,
    }
}

const fn unique(name: &'static str, table: &'static str, columns: &'static str) -> IndexDef {
    IndexDef {
        name,
        table,
        columns,
        unique: true,
    }
}

pub const GOLD_INDEXES: &[IndexDef] = &[
    index("ix_dim_project_projectid", "dim_project", "\"projectID\""),
    index("ix_dim_project_year", "dim_project", "year"),
    unique("ux_dim_organization_org_sk", "dim_organization", "org_sk"),
    index(
        "ix_dim_organization_organisationid",
        "dim_organization",
        "\"organisationID\"",
    ),
    unique("ux_dim_time_date_key", "dim_time", "date_key"),
    unique("ux_dim_country_country_key", "dim_country", "country_key"),
    unique("ux_dim_program_program_id", "dim_program", "program_id"),
    unique("ux_dim_topic_topic_id", "dim_topic", "topic_id"),
    unique("ux_dim_status_status_id", "dim_status", "status_id"),
    index("ix_bpp_project", "bridge_project_program", "\"projectID\""),
    index("ix_bpp_prog", "bridge_project_program", "program_id"),
    index("ix_bpt_project", "bridge_project_topic", "\"projectID\""),
    index("ix_bpt_topic", "bridge_project_topic", "topic_id"),
    index("ix_bps_project", "bridge_project_status", "\"projectID\""),
    index("ix_bps_status", "bridge_project_status", "status_id"),
    index("ix_fact_funding_projectid", "fact_funding", "\"projectID\""),
    index("ix_fact_funding_org_sk", "fact_funding", "org_sk"),
    index("ix_fact_funding_year", "fact_funding", "year"),
];

impl IndexDef {
    pub fn create_sql(&self, schema: &str) -> String {
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            self.name,
            qualified(schema, self.table),
            self.columns
        )
    }
}

/// Double-quote an identifier, escaping embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

pub fn sql_type(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Int => "BIGINT",
        ColumnType::Float => "DOUBLE PRECISION",
        ColumnType::Date => "DATE",
        ColumnType::Text => "TEXT",
    }
}

pub fn drop_table_sql(schema: &str, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", qualified(schema, table))
}

pub fn create_table_sql(schema: &str, table: &str, columns: &[String], types: &[ColumnType]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .zip(types)
        .map(|(c, t)| format!("{} {}", quote_ident(c), sql_type(*t)))
        .collect();
    format!("CREATE TABLE {} ({})", qualified(schema, table), defs.join(", "))
}

pub fn insert_prefix(schema: &str, table: &str, columns: &[String]) -> String {
    let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    format!("INSERT INTO {} ({}) ", qualified(schema, table), cols.join(", "))
}

pub fn count_sql(schema: &str, table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", qualified(schema, table))
}

/// Rows per INSERT so that `rows * columns <= max_params`. `None` when not
/// even one row fits.
pub fn chunk_size(max_params: usize, columns: usize) -> Option<usize> {
    let rows = max_params / columns.max(1);
    (rows >= 1).then_some(rows)
}
