//! Lake layers
//!
//! - bronze/ - raw CSV → silver snapshots, one handler per dataset
//! - gold/   - silver → dimensional gold tables, ordered by a declared DAG

pub mod bronze;
pub mod gold;
