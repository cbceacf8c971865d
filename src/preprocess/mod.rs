// src/preprocess/mod.rs
//
// Repairs the two corruption modes seen in upstream event logs: embedded
// NUL bytes that break text decoding, and logical records spilled across
// two physical lines. Each file runs sanitize → scan → repair, every
// mutation going through a write-temp-then-rename replace, so a reader
// only ever observes the pre-repair or fully post-repair file.

pub mod error;
pub mod repair;
pub mod sanitize;
pub mod scan;

pub use error::PreprocessError;
pub use repair::{quarantine_path, QuarantineReason, RepairOutcome, RepairReport};
pub use scan::Scan;

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, instrument};

/// What preprocessing did to one file.
#[derive(Debug)]
pub struct FileReport {
    pub expected_fields: usize,
    pub nuls_removed: u64,
    pub malformed: usize,
    pub merged: usize,
    pub quarantined: usize,
    pub empty_dropped: usize,
}

/// Per-file result of a batch run. Failures are isolated: one file's
/// error never aborts the others.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<FileReport, PreprocessError>,
}

/// Run the full three-stage pipeline on one file, strictly in order: the
/// scanner needs sanitized input, the repairer needs the scanner's
/// schema width and malformed-line index. The repairer only runs when
/// the index is non-empty; a clean file is untouched after sanitization.
#[instrument(level = "info", skip(path), fields(file = %path.display()))]
pub fn preprocess_file(path: &Path) -> Result<FileReport, PreprocessError> {
    let nuls_removed = sanitize::sanitize(path)?;
    let scan = scan::scan(path)?;

    if !scan.needs_repair() {
        debug!("no malformed lines");
        return Ok(FileReport {
            expected_fields: scan.expected_fields,
            nuls_removed,
            malformed: 0,
            merged: 0,
            quarantined: 0,
            empty_dropped: 0,
        });
    }

    info!(malformed = scan.malformed.len(), "fixing malformed lines");
    let report = repair::repair(path, &scan)?;

    Ok(FileReport {
        expected_fields: scan.expected_fields,
        nuls_removed,
        malformed: scan.malformed.len(),
        merged: report.merged(),
        quarantined: report.quarantined(),
        empty_dropped: report.empty_dropped.len(),
    })
}

/// Preprocess a batch of files. Files are independent units of work, so
/// they run in parallel; stages within a file stay sequential, and no
/// two stages ever touch the same file concurrently. Returns one outcome
/// per input file, in input order.
pub fn preprocess_all(paths: &[PathBuf]) -> Vec<FileOutcome> {
    paths
        .par_iter()
        .map(|path| FileOutcome {
            path: path.clone(),
            result: preprocess_file(path),
        })
        .collect()
}
