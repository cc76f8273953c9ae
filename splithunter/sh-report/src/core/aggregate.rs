//! Merge per-sample JSON records into one table and render it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use config::{get_progress_bar, is_failure_record, Fields, SAMPLE_KEY};
use dashmap::DashMap;
use log::{info, warn};
use rayon::prelude::*;
use serde_json::{Map, Number, Value};

use crate::core::ReportError;

/// one row per sample key; rows and columns are always sorted
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AggregatedTable {
    rows: BTreeMap<String, Fields>,
}

impl AggregatedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, sample_key: &str) -> Option<&Fields> {
        self.rows.get(sample_key)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&String, &Fields)> {
        self.rows.iter()
    }

    /// insert a row under its `SampleKey`; a later row with the same key wins
    pub fn insert(&mut self, sample_key: String, mut row: Fields) {
        row.insert(SAMPLE_KEY.to_string(), Value::String(sample_key.clone()));
        self.rows.insert(sample_key, row);
    }

    /// `SampleKey` first, then the union of every other field, sorted
    pub fn columns(&self) -> Vec<String> {
        let others: BTreeSet<&String> = self
            .rows
            .values()
            .flat_map(|row| row.keys())
            .filter(|k| k.as_str() != SAMPLE_KEY)
            .collect();

        std::iter::once(SAMPLE_KEY.to_string())
            .chain(others.into_iter().cloned())
            .collect()
    }

    pub fn render(&self, delimiter: char) -> String {
        let columns = self.columns();
        let sep = delimiter.to_string();

        let mut out = columns.join(&sep);
        out.push('\n');

        for row in self.rows.values() {
            let line = columns
                .iter()
                .map(|col| row.get(col).map(cell).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(&sep);
            out.push_str(&line);
            out.push('\n');
        }

        out
    }

    /// read back a table previously written by [`AggregatedTable::render`]
    pub fn from_delimited(text: &str, delimiter: char) -> Result<Self, ReportError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let Some(header) = lines.next() else {
            return Ok(Self::default());
        };

        let columns: Vec<&str> = header.split(delimiter).collect();
        let key_idx = columns
            .iter()
            .position(|c| *c == SAMPLE_KEY)
            .ok_or_else(|| ReportError::MissingField {
                sample_key: "<header>".to_string(),
                field: SAMPLE_KEY.to_string(),
            })?;

        let mut table = Self::default();
        for line in lines {
            let cells: Vec<&str> = line.split(delimiter).collect();
            let Some(sample_key) = cells.get(key_idx).filter(|k| !k.is_empty()) else {
                warn!("Skipping row without a sample key: {}", line);
                continue;
            };

            let row: Fields = columns
                .iter()
                .zip(cells.iter())
                .filter(|(col, value)| **col != SAMPLE_KEY && !value.is_empty())
                .map(|(col, value)| (col.to_string(), parse_cell(value)))
                .collect();

            table.insert(sample_key.to_string(), row);
        }

        Ok(table)
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn parse_cell(value: &str) -> Value {
    if let Ok(n) = value.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Some(n) = value.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(value.to_string()),
    }
}

fn read_record(path: &Path) -> Result<Map<String, Value>, ReportError> {
    let contents = std::fs::read_to_string(path)?;

    match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ReportError::Json {
            path: path.to_path_buf(),
            reason: "expected a JSON object".to_string(),
        }),
        Err(e) => Err(ReportError::Json {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// read every record on at most `threads` workers and merge them
///
/// Failure records are skipped. When two files carry the same sample key
/// the one with the greater path wins, so the result never depends on the
/// order of `files`.
pub fn aggregate(files: &[PathBuf], threads: usize) -> Result<AggregatedTable, ReportError> {
    if files.is_empty() {
        return Err(ReportError::EmptyResult);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.clamp(1, files.len()))
        .build()?;

    let pb = get_progress_bar(files.len() as u64, "Parsing JSON records...");
    let acc: DashMap<String, (PathBuf, Map<String, Value>)> = DashMap::new();

    pool.install(|| {
        files.par_iter().try_for_each(|path| -> Result<(), ReportError> {
            let record = read_record(path)?;
            pb.inc(1);

            if is_failure_record(&record) {
                warn!("Skipping failed sample record {:?}", path);
                return Ok(());
            }

            let sample_key = record
                .get(SAMPLE_KEY)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| config::sample_key_from_path(&path.display().to_string()));

            acc.entry(sample_key)
                .and_modify(|(kept, rec)| {
                    if *path > *kept {
                        *kept = path.clone();
                        *rec = record.clone();
                    }
                })
                .or_insert_with(|| (path.clone(), record.clone()));

            Ok(())
        })
    })?;
    pb.finish_and_clear();

    let mut table = AggregatedTable::default();
    for (sample_key, (_, record)) in acc.into_iter() {
        table.insert(sample_key, record.into_iter().collect());
    }

    if table.is_empty() {
        return Err(ReportError::EmptyResult);
    }

    info!("Records aggregated: {}", table.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_json(dir: &Path, name: &str, value: Value) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_columns_are_key_first_then_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            write_json(dir.path(), "b.json", json!({"SampleKey": "b", "z": 1, "a": "x"})),
            write_json(dir.path(), "a.json", json!({"SampleKey": "a", "m": 2.5})),
        ];

        let table = aggregate(&files, 2).unwrap();
        assert_eq!(table.columns(), vec!["SampleKey", "a", "m", "z"]);
        assert_eq!(
            table.render('\t'),
            "SampleKey\ta\tm\tz\na\t\t2.5\t\nb\tx\t\t1\n"
        );
    }

    #[test]
    fn test_render_is_order_independent() {
        let dir = tempfile::tempdir().unwrap();
        let mut files: Vec<PathBuf> = (0..12)
            .map(|i| {
                write_json(
                    dir.path(),
                    &format!("s{i:02}.json"),
                    json!({"SampleKey": format!("s{i:02}"), "TRA.SR-TOTAL": i * 100, format!("f{}", i % 3): i}),
                )
            })
            .collect();
        // INFO: same key twice, the greater path must win either way
        files.push(write_json(
            dir.path(),
            "zz_dup.json",
            json!({"SampleKey": "s00", "TRA.SR-TOTAL": 7}),
        ));

        let forward = aggregate(&files, 4).unwrap().render('\t');
        files.reverse();
        let backward = aggregate(&files, 1).unwrap().render('\t');
        files.swap(0, 5);
        files.swap(3, 9);
        let shuffled = aggregate(&files, 3).unwrap().render('\t');

        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
        assert!(forward.contains("\ns00\t"));
        assert_eq!(
            aggregate(&files, 2).unwrap().get("s00").unwrap()["TRA.SR-TOTAL"],
            json!(7)
        );
    }

    #[test]
    fn test_empty_inputs_are_terminal() {
        assert!(matches!(aggregate(&[], 4), Err(ReportError::EmptyResult)));

        let dir = tempfile::tempdir().unwrap();
        let files = vec![write_json(
            dir.path(),
            "bad.json",
            json!({"SampleKey": "bad", "Success": false, "Error": "boom"}),
        )];
        assert!(matches!(aggregate(&files, 1), Err(ReportError::EmptyResult)));
    }

    #[test]
    fn test_malformed_record_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torn.json");
        std::fs::write(&path, "{\"SampleKey\": ").unwrap();

        assert!(matches!(
            aggregate(&[path], 1),
            Err(ReportError::Json { .. })
        ));
    }

    #[test]
    fn test_missing_key_falls_back_to_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![write_json(dir.path(), "NA12878.json", json!({"x": 1}))];

        let table = aggregate(&files, 1).unwrap();
        assert!(table.get("NA12878").is_some());
    }

    #[test]
    fn test_rendered_table_reads_back() {
        let mut table = AggregatedTable::default();
        let mut row = Fields::new();
        row.insert("TRA.SR-TOTAL".into(), json!(1000000));
        row.insert("TRA.SR-PPM".into(), json!(1.5));
        row.insert(
            "TRA.SR-DETAILS".into(),
            json!("1:58,460-58,557(+)|1:135,876-135,929(-);"),
        );
        table.insert("176449128".into(), row);

        let text = table.render('\t');
        let back = AggregatedTable::from_delimited(&text, '\t').unwrap();

        assert_eq!(back, table);
        assert_eq!(back.get("176449128").unwrap()[SAMPLE_KEY], json!("176449128"));
    }
}
