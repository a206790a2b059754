use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, instrument};

use crate::tuneset::tools::error::{Result, ToolError};
use crate::tuneset::tools::model::Record;

/// Writes `records` to `path` as newline-delimited JSON, one object per line in
/// input order. An existing file is overwritten; a failed write may leave a
/// partial file behind.
#[instrument(level = "info", skip(records), fields(path = %path.display(), record_count = records.len()))]
pub fn write_records(records: &[Record], path: &Path) -> Result<()> {
    write_lines(records, path).map_err(|source| ToolError::SerializationFailed {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("dataset written");
    Ok(())
}

fn write_lines(records: &[Record], path: &Path) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// Reads a newline-delimited JSON dataset back into records. Blank lines are
/// ignored.
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let failed = |source: std::io::Error| ToolError::SerializationFailed {
        path: path.to_path_buf(),
        source,
    };

    let reader = BufReader::new(File::open(path).map_err(failed)?);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(failed)?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str::<Record>(&line).map_err(|err| {
            failed(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("line {}: {err}", index + 1),
            ))
        })?;
        records.push(record);
    }
    Ok(records)
}
