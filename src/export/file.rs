use super::{ready, ExportError, ExportResult, RuleBundle};
use crate::entity::{CellValue, Record, Row};
use crate::store::EntitySnapshot;
use crate::validation::ValidationReport;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CLIENTS_FILE: &str = "clients-validated.csv";
pub const WORKERS_FILE: &str = "workers-validated.csv";
pub const TASKS_FILE: &str = "tasks-validated.csv";
pub const RULES_FILE: &str = "rules-config.json";

/// Header for a collection: known columns in canonical order, then extras sorted by name.
fn header<R: Record>(rows: &[R]) -> Vec<String> {
    let mut columns: Vec<String> = R::COLUMNS
        .iter()
        .filter(|column| rows.iter().any(|row| row.get(column).is_some()))
        .map(|column| column.to_string())
        .collect();
    let extras: BTreeSet<&String> = rows.iter().flat_map(|row| row.extra().keys()).collect();
    columns.extend(extras.into_iter().cloned());
    columns
}

pub fn write_entity_csv<W: Write, R: Record>(writer: W, rows: &[R]) -> ExportResult<()> {
    let columns = header(rows);
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(&columns)?;
    for row in rows {
        writer.write_record(columns.iter().map(|column| {
            row.get(column)
                .map(ToString::to_string)
                .unwrap_or_default()
        }))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_bundle_to_json<P: AsRef<Path>>(bundle: &RuleBundle, path: P) -> ExportResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, bundle)?;
    Ok(())
}

pub fn load_bundle_from_json<P: AsRef<Path>>(path: P) -> ExportResult<RuleBundle> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

fn write_collection<R: Record>(dir: &Path, name: &str, rows: &[R], written: &mut Vec<PathBuf>) -> ExportResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let path = dir.join(name);
    write_entity_csv(File::create(&path)?, rows)?;
    info!(path = %path.display(), rows = rows.len(), "collection exported");
    written.push(path);
    Ok(())
}

/// Writes the validated collections and the rule bundle into `dir`. Refuses while the
/// export gate is closed; empty collections are skipped.
pub fn export_all<P: AsRef<Path>>(
    dir: P,
    snapshot: &EntitySnapshot,
    report: &ValidationReport,
    bundle: &RuleBundle,
) -> ExportResult<Vec<PathBuf>> {
    ready(snapshot.counts(), report).into_result()?;

    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(4);
    write_collection(dir, CLIENTS_FILE, snapshot.clients(), &mut written)?;
    write_collection(dir, WORKERS_FILE, snapshot.workers(), &mut written)?;
    write_collection(dir, TASKS_FILE, snapshot.tasks(), &mut written)?;

    let rules_path = dir.join(RULES_FILE);
    save_bundle_to_json(bundle, &rules_path)?;
    info!(path = %rules_path.display(), rules = bundle.rules.len(), "rule bundle exported");
    written.push(rules_path);
    Ok(written)
}

/// Reads a CSV file into rows keyed by header. Every cell is kept as text.
pub fn read_rows_csv<P: AsRef<Path>>(path: P) -> ExportResult<Vec<Row>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_reader(File::open(path)?);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, cell)| (header.clone(), CellValue::Text(cell.to_string())))
            .collect();
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(ExportError::NoRecords {
            path: path.to_path_buf(),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Worker;

    #[test]
    fn list_cells_with_commas_are_quoted() {
        let workers = vec![Worker::new("W1", "Ann", "sql,python", "1,2")];
        let mut out = Vec::new();
        write_entity_csv(&mut out, &workers).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "WorkerID,WorkerName,Skills,AvailableSlots\nW1,Ann,\"sql,python\",\"1,2\"\n"
        );
    }
}
