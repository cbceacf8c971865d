use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info};

use crate::preprocess::error::PreprocessError;

/// Result of a read-only integrity scan of one sanitized file.
#[derive(Debug)]
pub struct Scan {
    /// Expected field count, taken from the header record on line 1.
    pub expected_fields: usize,
    /// 1-based physical line number → the malformed record found there.
    /// Header is line 1, so data rows start at 2.
    pub malformed: BTreeMap<usize, Vec<String>>,
    /// Line numbers of rows with no populated fields at all. Noted for
    /// the repairer (which drops them) but never part of `malformed`.
    pub empty_lines: Vec<usize>,
}

impl Scan {
    pub fn needs_repair(&self) -> bool {
        !self.malformed.is_empty()
    }
}

/// Parse one physical line as a single CSV record. An empty line yields
/// an empty record. Classification and repair address rows by physical
/// line number (blank lines included), which is why files are walked
/// line-by-line instead of through one whole-file `csv::Reader` — that
/// reader silently skips blank lines and would shift the numbering.
pub(crate) fn parse_line(line: &str) -> Result<Vec<String>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    if rdr.read_record(&mut record)? {
        Ok(record.iter().map(str::to_string).collect())
    } else {
        Ok(Vec::new())
    }
}

/// Count of non-empty fields in a record.
pub(crate) fn populated_count(fields: &[String]) -> usize {
    fields.iter().filter(|f| !f.is_empty()).count()
}

/// Read the header of `path` to establish the expected field count, then
/// classify every data row as intact, empty, or malformed (partially
/// populated). Read-only; safe to re-run. The header's own length defines
/// the schema even though the header is not a data row.
pub fn scan(path: &Path) -> Result<Scan, PreprocessError> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => parse_line(&line?)?,
        None => {
            return Err(PreprocessError::EmptyFile {
                file: path.to_path_buf(),
            })
        }
    };
    let expected_fields = header.len();
    debug!(file = %path.display(), expected_fields, "scanning");

    let mut malformed = BTreeMap::new();
    let mut empty_lines = Vec::new();

    // start from 2 since the header consumed line 1
    for (line_no, line) in (2..).zip(lines) {
        let fields = parse_line(&line?)?;
        let populated = populated_count(&fields);

        if populated == 0 {
            empty_lines.push(line_no);
        } else if populated < expected_fields {
            info!(file = %path.display(), line = line_no, populated, "malformed row");
            malformed.insert(line_no, fields);
        }
    }

    Ok(Scan {
        expected_fields,
        malformed,
        empty_lines,
    })
}
