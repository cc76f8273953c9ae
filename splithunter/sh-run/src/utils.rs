use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use config::{is_complete_record, record_name, AlignmentPath, SampleResult, COMMA};
use flate2::read::MultiGzDecoder;
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};

/// open a plain or gzip-compressed text file
pub fn reader<P: AsRef<Path>>(path: P) -> std::io::Result<Box<dyn BufRead>> {
    let file = File::open(&path)?;
    let is_gz = path
        .as_ref()
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let inner: Box<dyn Read> = if is_gz {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };

    Ok(Box::new(BufReader::new(inner)))
}

/// look a sample key up in a headerless `sampleKey,bamPath` table
pub fn lookup_reference<P: AsRef<Path>>(
    table: P,
    sample_key: &str,
) -> std::io::Result<Option<String>> {
    for line in reader(table)?.lines() {
        let line = line?;
        let mut atoms = line.trim().split(COMMA);

        if let (Some(key), Some(bam)) = (atoms.next(), atoms.next()) {
            if key.trim() == sample_key {
                return Ok(Some(bam.trim().to_string()));
            }
        }
    }

    Ok(None)
}

/// remove index sidecars that could shadow the index of `bam`
///
/// For `x.bam` these are `x.bam.bai` and `x.bai`; for `x.cram`,
/// `x.cram.crai` and `x.crai`.
pub fn clear_stale_indices(dir: &Path, bam: &AlignmentPath) -> std::io::Result<Vec<PathBuf>> {
    let name = bam.file_name();
    let index = if name.ends_with(".cram") { "crai" } else { "bai" };
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(&name);

    let mut removed = Vec::new();
    for sidecar in [format!("{name}.{index}"), format!("{stem}.{index}")] {
        let path = dir.join(sidecar);
        if path.is_file() {
            log::debug!("Remove index {:?}", path);
            std::fs::remove_file(&path)?;
            removed.push(path);
        }
    }

    Ok(removed)
}

/// path of the persisted record of a sample in the sink
pub fn record_path(sink: &Path, sample_key: &str) -> PathBuf {
    sink.join(record_name(sample_key))
}

/// serialize a record pretty-printed with a 4-space indent
pub fn to_pretty_json(record: &Value) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(record, &mut ser)?;
    buf.push(b'\n');

    Ok(buf)
}

/// persist one result as `<sink>/<sampleKey>.json`
///
/// The record is written next to its final name and renamed into place,
/// so readers never observe a partially written file.
pub fn write_record(sink: &Path, result: &SampleResult) -> std::io::Result<PathBuf> {
    let path = record_path(sink, &result.sample_key);
    let tmp = sink.join(format!(".{}.tmp", record_name(&result.sample_key)));

    let bytes = to_pretty_json(&result.to_record())?;
    {
        let mut f = File::create(&tmp)?;
        f.write_all(&bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, &path)?;

    Ok(path)
}

/// a sample is done if its record exists, parses, and is not a failure marker
pub fn has_valid_record(sink: &Path, sample_key: &str) -> bool {
    let path = record_path(sink, sample_key);
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return false;
    };

    match serde_json::from_str::<Value>(&contents) {
        Ok(record) => is_complete_record(&record, sample_key),
        Err(e) => {
            log::debug!("Ignoring unreadable record {:?}: {}", path, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Fields, TaskFailure};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use serde_json::json;

    #[test]
    fn test_lookup_reference_in_gz_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("bams.csv.gz");

        let mut gz = GzEncoder::new(File::create(&table).unwrap(), Compression::default());
        writeln!(gz, "176449128,s3://hli/176449128.bam").unwrap();
        writeln!(gz, "176449129,s3://hli/176449129.bam").unwrap();
        gz.finish().unwrap();

        assert_eq!(
            lookup_reference(&table, "176449129").unwrap(),
            Some("s3://hli/176449129.bam".to_string())
        );
        assert_eq!(lookup_reference(&table, "000").unwrap(), None);
    }

    #[test]
    fn test_clear_stale_indices_removes_both_names() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["NA12878.bam.bai", "NA12878.bai", "other.bai"] {
            File::create(dir.path().join(name)).unwrap();
        }

        let bam = AlignmentPath::Remote("s3://bucket/NA12878.bam".to_string());
        let removed = clear_stale_indices(dir.path(), &bam).unwrap();

        assert_eq!(removed.len(), 2);
        assert!(!dir.path().join("NA12878.bam.bai").exists());
        assert!(!dir.path().join("NA12878.bai").exists());
        assert!(dir.path().join("other.bai").exists());
    }

    #[test]
    fn test_written_record_is_valid_and_failures_are_not() {
        let dir = tempfile::tempdir().unwrap();

        let mut fields = Fields::new();
        fields.insert("TRA.SR-TOTAL".into(), json!(10));
        write_record(dir.path(), &SampleResult::success("ok", fields)).unwrap();
        write_record(
            dir.path(),
            &SampleResult::failure("bad", TaskFailure::Panicked("boom".into())),
        )
        .unwrap();
        std::fs::write(dir.path().join("torn.json"), "{\"SampleKey\": \"to").unwrap();

        assert!(has_valid_record(dir.path(), "ok"));
        assert!(!has_valid_record(dir.path(), "bad"));
        assert!(!has_valid_record(dir.path(), "torn"));
        assert!(!has_valid_record(dir.path(), "absent"));

        let text = std::fs::read_to_string(dir.path().join("ok.json")).unwrap();
        assert!(text.contains("\n    \"SampleKey\": \"ok\""));
    }
}
