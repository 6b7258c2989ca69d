//! Search documents built from `dim_project` rows

use lakehouse_etl::shared::{Frame, Value};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// One project as seen by the search index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchDocument {
    pub project_id: String,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub country: Option<String>,
    pub year: Option<i32>,
    /// `title | abstract | country | year`
    #[serde(skip)]
    pub text: String,
    pub text_hash: String,
}

/// A document with its embedding, ready for upsert
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub document: SearchDocument,
    pub embedding: Vec<f32>,
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(v) => v.to_text(),
    }
}

fn optional_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.to_text()),
    }
}

fn year_of(value: Option<&Value>) -> Option<i32> {
    match value {
        Some(Value::Int(y)) => i32::try_from(*y).ok(),
        Some(Value::Float(y)) if y.fract() == 0.0 => i32::try_from(*y as i64).ok(),
        Some(Value::Str(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text that gets embedded; missing fields become empty segments
pub fn compose_text(title: &str, abstract_text: &str, country: &str, year: &str) -> String {
    [title, abstract_text, country, year]
        .join(" | ")
        .trim()
        .to_string()
}

/// SHA-256 of the text, lowercase hex
pub fn text_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

impl SearchDocument {
    /// Build from row `row` of `dim_project`. Rows without a project id are
    /// not indexable.
    pub fn from_row(frame: &Frame, row: usize) -> Option<Self> {
        let project_id = optional_text(frame.value(row, "projectID"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())?;

        let text = compose_text(
            &text_of(frame.value(row, "title")),
            &text_of(frame.value(row, "abstract")),
            &text_of(frame.value(row, "country")),
            &text_of(frame.value(row, "year")),
        );
        Some(Self {
            project_id,
            title: optional_text(frame.value(row, "title")),
            abstract_text: optional_text(frame.value(row, "abstract")),
            country: optional_text(frame.value(row, "country")),
            year: year_of(frame.value(row, "year")),
            text_hash: text_hash(&text),
            text,
        })
    }

    /// Every indexable document of a `dim_project` frame, in row order
    pub fn from_frame(frame: &Frame) -> Vec<Self> {
        (0..frame.len())
            .filter_map(|row| Self::from_row(frame, row))
            .collect()
    }
}
