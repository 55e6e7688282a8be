//! Record serialization
//!
//! Two formats are written from the same ordered records: line-delimited
//! JSON with one object per record, and a delimited table whose header is
//! the union of all field names. Both depend only on their input, so equal
//! records produce byte-identical files.

use crate::config::StageFiles;
use crate::model::FieldMap;
use crate::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Computes the table header for a set of records
///
/// Columns listed in `common` come first, in that order, when at least one
/// record has them. Every other field follows in alphabetical order.
pub fn column_order(records: &[FieldMap], common: &[String]) -> Vec<String> {
    let all: BTreeSet<&str> = records.iter().flat_map(FieldMap::keys).collect();

    let mut columns: Vec<String> = common
        .iter()
        .filter(|c| all.contains(c.as_str()))
        .cloned()
        .collect();
    columns.extend(
        all.iter()
            .filter(|k| !common.iter().any(|c| c == *k))
            .map(|k| k.to_string()),
    );
    columns
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Writes one JSON object per line
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut writer = create(path)?;
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes records as a table; missing fields are written as empty cells
pub fn write_csv(path: &Path, records: &[FieldMap], common: &[String]) -> Result<()> {
    let columns = column_order(records, common);
    let mut writer = csv::Writer::from_writer(create(path)?);

    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(columns.iter().map(|c| record.get(c).unwrap_or("")))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes both output files of one stage
pub fn write_records(files: &StageFiles, common: &[String], records: &[FieldMap]) -> Result<()> {
    write_jsonl(&files.jsonl, records)?;
    write_csv(&files.csv, records, common)?;
    info!(
        "Wrote {} records to {} and {}",
        records.len(),
        files.jsonl.display(),
        files.csv.display()
    );
    Ok(())
}
