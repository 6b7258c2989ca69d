//! Columnar snapshots (Arrow IPC file format)
//!
//! One file per table: `<dir>/<name>.arrow`. Column types are inferred from
//! cells, see [`ColumnType::infer`]. The same frame always encodes to the
//! same bytes.

use crate::errors::{EtlError, Result};
use crate::shared::frame::{Frame, Value};
use arrow::array::{
    Array, ArrayRef, Date32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::util::display::array_value_to_string;
use arrow_ipc::reader::FileReader;
use arrow_ipc::writer::FileWriter;
use chrono::{DateTime, NaiveDate, Utc};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub const SNAPSHOT_EXTENSION: &str = "arrow";

/// Logical column type of a frame column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    Date,
    Text,
}

impl ColumnType {
    /// All-Int → Int, Int/Float mix → Float, all-Date → Date, else Text.
    /// Nulls are ignored; an all-null column is Text.
    pub fn infer<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut seen: Option<ColumnType> = None;
        for v in values {
            let t = match v {
                Value::Null => continue,
                Value::Int(_) => ColumnType::Int,
                Value::Float(_) => ColumnType::Float,
                Value::Date(_) => ColumnType::Date,
                Value::Str(_) => return ColumnType::Text,
            };
            seen = Some(match (seen, t) {
                (None, t) => t,
                (Some(a), b) if a == b => a,
                (Some(ColumnType::Int), ColumnType::Float)
                | (Some(ColumnType::Float), ColumnType::Int) => ColumnType::Float,
                _ => return ColumnType::Text,
            });
        }
        seen.unwrap_or(ColumnType::Text)
    }

    fn data_type(self) -> DataType {
        match self {
            ColumnType::Int => DataType::Int64,
            ColumnType::Float => DataType::Float64,
            ColumnType::Date => DataType::Date32,
            ColumnType::Text => DataType::Utf8,
        }
    }
}

/// Column types of every column of a frame, in order
pub fn column_types(frame: &Frame) -> Vec<ColumnType> {
    (0..frame.columns().len())
        .map(|c| ColumnType::infer(frame.rows().iter().map(|r| &r[c])))
        .collect()
}

fn epoch() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

fn build_array(frame: &Frame, col: usize, ty: ColumnType) -> ArrayRef {
    let cells = frame.rows().iter().map(|r| &r[col]);
    match ty {
        ColumnType::Int => Arc::new(cells.map(Value::as_i64).collect::<Int64Array>()),
        ColumnType::Float => Arc::new(
            cells
                .map(|v| match v {
                    Value::Int(i) => Some(*i as f64),
                    Value::Float(f) => Some(*f),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        ColumnType::Date => Arc::new(
            cells
                .map(|v| v.as_date().map(|d| (d - epoch()).num_days() as i32))
                .collect::<Date32Array>(),
        ),
        ColumnType::Text => Arc::new(
            cells
                .map(|v| match v {
                    Value::Null => None,
                    other => Some(other.to_text()),
                })
                .collect::<StringArray>(),
        ),
    }
}

/// Encode a frame as a single record batch
pub fn frame_to_batch(frame: &Frame) -> Result<RecordBatch> {
    let types = column_types(frame);
    let fields: Vec<Field> = frame
        .columns()
        .iter()
        .zip(&types)
        .map(|(name, ty)| Field::new(name, ty.data_type(), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));
    let arrays: Vec<ArrayRef> = types
        .iter()
        .enumerate()
        .map(|(c, ty)| build_array(frame, c, *ty))
        .collect();
    let options = RecordBatchOptions::new().with_row_count(Some(frame.len()));
    Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}

fn cell(array: &ArrayRef, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match array.data_type() {
        DataType::Int64 => array
            .as_any()
            .downcast_ref::<Int64Array>()
            .map(|a| Value::Int(a.value(row))),
        DataType::Int32 => array
            .as_any()
            .downcast_ref::<Int32Array>()
            .map(|a| Value::Int(i64::from(a.value(row)))),
        DataType::Float64 => array
            .as_any()
            .downcast_ref::<Float64Array>()
            .map(|a| Value::Float(a.value(row))),
        DataType::Date32 => array
            .as_any()
            .downcast_ref::<Date32Array>()
            .and_then(|a| a.value_as_date(row))
            .map(Value::Date),
        DataType::Utf8 => array
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|a| Value::Str(a.value(row).to_string())),
        _ => Some(Value::Str(array_value_to_string(array, row)?)),
    };
    value.ok_or_else(|| {
        EtlError::snapshot(format!(
            "column of type {} could not be decoded",
            array.data_type()
        ))
    })
}

/// Decode record batches back into a frame
pub fn batches_to_frame(schema: &Schema, batches: &[RecordBatch]) -> Result<Frame> {
    let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    let mut frame = Frame::new(columns);
    for batch in batches {
        for row in 0..batch.num_rows() {
            let cells = batch
                .columns()
                .iter()
                .map(|a| cell(a, row))
                .collect::<Result<Vec<_>>>()?;
            frame.push_row(cells);
        }
    }
    Ok(frame)
}

/// A directory of named snapshots
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, SNAPSHOT_EXTENSION))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Read a snapshot. A missing file is `Ok(None)`.
    pub fn read(&self, name: &str) -> Result<Option<Frame>> {
        let path = self.path(name);
        if !path.is_file() {
            debug!("[snapshot] {} absent", path.display());
            return Ok(None);
        }
        let reader = FileReader::try_new(File::open(&path)?, None)?;
        let schema = reader.schema();
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        batches_to_frame(&schema, &batches).map(Some)
    }

    /// Read a snapshot, treating a missing file as an empty frame
    pub fn read_or_empty(&self, name: &str) -> Result<Frame> {
        Ok(self.read(name)?.unwrap_or_default())
    }

    /// Write (replace) a snapshot. The file is staged next to the target
    /// and renamed into place.
    pub fn write(&self, name: &str, frame: &Frame) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let batch = frame_to_batch(frame)?;
        let target = self.path(name);
        let staging = self.dir.join(format!(".{}.{}.tmp", name, SNAPSHOT_EXTENSION));
        {
            let file = BufWriter::new(File::create(&staging)?);
            let mut writer = FileWriter::try_new(file, &batch.schema())?;
            writer.write(&batch)?;
            writer.finish()?;
        }
        std::fs::rename(&staging, &target)?;
        debug!(
            "[snapshot] wrote {} ({} rows)",
            target.display(),
            frame.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Frame {
        let d = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        Frame::from_rows(
            vec!["id".into(), "n".into(), "x".into(), "d".into(), "empty".into()],
            vec![
                vec!["a".into(), Value::Int(1), Value::Int(2), Value::Date(d), Value::Null],
                vec![Value::Null, Value::Null, Value::Float(2.5), Value::Null, Value::Null],
            ],
        )
    }

    #[test]
    fn test_type_inference() {
        let f = sample();
        assert_eq!(
            column_types(&f),
            vec![
                ColumnType::Text,
                ColumnType::Int,
                ColumnType::Float,
                ColumnType::Date,
                ColumnType::Text
            ]
        );
    }

    #[test]
    fn test_mixed_column_is_text() {
        let values = [Value::Int(1), Value::str("x")];
        assert_eq!(ColumnType::infer(values.iter()), ColumnType::Text);
        let values = [Value::Int(1), Value::Date(epoch())];
        assert_eq!(ColumnType::infer(values.iter()), ColumnType::Text);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.write("t", &sample()).unwrap();
        let back = store.read("t").unwrap().unwrap();

        assert_eq!(back.columns(), sample().columns());
        assert_eq!(back.value(0, "x"), Some(&Value::Float(2.0)));
        assert_eq!(back.value(1, "x"), Some(&Value::Float(2.5)));
        assert_eq!(back.value(0, "d"), sample().value(0, "d"));
        assert_eq!(back.value(1, "id"), Some(&Value::Null));
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(store.read("nope").unwrap().is_none());
        assert!(store.read_or_empty("nope").unwrap().is_empty());
    }

    #[test]
    fn test_identical_frames_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.write("a", &sample()).unwrap();
        store.write("b", &sample()).unwrap();
        let a = std::fs::read(store.path("a")).unwrap();
        let b = std::fs::read(store.path("b")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_row_frame() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let empty = Frame::new(vec!["a".into()]);
        store.write("e", &empty).unwrap();
        let back = store.read("e").unwrap().unwrap();
        assert_eq!(back.columns(), &["a"]);
        assert!(back.is_empty());
    }
}
