// src/preprocess/repair.rs
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::preprocess::error::PreprocessError;
use crate::preprocess::scan::{parse_line, populated_count, Scan};

/// Why a malformed row could not be merged with its neighbour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuarantineReason {
    /// The next physical line is not malformed (or does not exist), so
    /// there is nothing to merge with.
    NoPartner,
    /// The next line is malformed too, but the populated counts do not
    /// sum to the expected field count.
    WidthMismatch { sum: usize, expected: usize },
}

impl QuarantineReason {
    fn describe(&self) -> String {
        match self {
            QuarantineReason::NoPartner => "no adjacent malformed partner".to_string(),
            QuarantineReason::WidthMismatch { sum, expected } => {
                format!("populated counts sum to {sum}, expected {expected}")
            }
        }
    }
}

/// Per-malformed-row result of a repair pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Merged forward with the named partner line.
    Merged { partner: usize },
    /// Held out of the repaired file and preserved in the quarantine sink.
    Quarantined(QuarantineReason),
}

/// What a repair pass did, keyed by 1-based physical line number.
/// Consumed partner lines (`i+1` of a successful merge) carry no outcome
/// of their own.
#[derive(Debug, Default)]
pub struct RepairReport {
    pub outcomes: Vec<(usize, RepairOutcome)>,
    pub empty_dropped: Vec<usize>,
}

impl RepairReport {
    pub fn merged(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, RepairOutcome::Merged { .. }))
            .count()
    }

    pub fn quarantined(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, RepairOutcome::Quarantined(_)))
            .count()
    }
}

/// Sibling path holding rows the repairer could not confidently fix.
/// Uses the `.quarantine` extension so `*.csv` discovery never picks the
/// sink up as an input file.
pub fn quarantine_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".quarantine");
    PathBuf::from(os)
}

/// Rewrite `path`, merging adjacent malformed rows whose populated counts
/// sum to the expected field count.
///
/// Rows absent from the malformed index pass through unchanged, in order.
/// Rows with no populated fields are dropped with a logged notice. A
/// malformed row `i` merges forward with `i+1` only when `i+1` is also
/// malformed and the two populated counts sum exactly to the schema
/// width; the merged record is `i`'s full field list followed by `i+1`'s,
/// and `i+1` is marked consumed so it is never processed again. Anything
/// else goes to the quarantine sink (line number, reason, original
/// fields) and is held out of the repaired file.
///
/// The file is replaced atomically once the rewrite is complete.
pub fn repair(path: &Path, scan: &Scan) -> Result<RepairReport, PreprocessError> {
    let reader = BufReader::new(File::open(path)?);
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(parent)?;

    let mut report = RepairReport::default();
    let mut consumed: HashSet<usize> = HashSet::new();
    // created lazily; a clean pass leaves no quarantine file behind
    let mut quarantine: Option<csv::Writer<File>> = None;

    let sink = quarantine_path(path);
    match fs::remove_file(&sink) {
        Ok(()) => warn!(file = %sink.display(), "removed stale quarantine file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(&mut tmp);

        for (line_no, line) in (1..).zip(reader.lines()) {
            let line = line?;
            if consumed.contains(&line_no) {
                continue;
            }
            let fields = parse_line(&line)?;

            if !scan.malformed.contains_key(&line_no) {
                if populated_count(&fields) == 0 {
                    info!(file = %path.display(), line = line_no, "dropping empty row");
                    report.empty_dropped.push(line_no);
                } else {
                    writer.write_record(&fields)?;
                }
                continue;
            }

            let this = &scan.malformed[&line_no];
            let outcome = match scan.malformed.get(&(line_no + 1)) {
                Some(next)
                    if populated_count(this) + populated_count(next) == scan.expected_fields =>
                {
                    let merged = this.iter().chain(next.iter());
                    writer.write_record(merged)?;
                    consumed.insert(line_no + 1);
                    info!(
                        file = %path.display(),
                        first = line_no,
                        second = line_no + 1,
                        "combined spilled lines"
                    );
                    RepairOutcome::Merged {
                        partner: line_no + 1,
                    }
                }
                Some(next) => RepairOutcome::Quarantined(QuarantineReason::WidthMismatch {
                    sum: populated_count(this) + populated_count(next),
                    expected: scan.expected_fields,
                }),
                None => RepairOutcome::Quarantined(QuarantineReason::NoPartner),
            };

            if let RepairOutcome::Quarantined(reason) = &outcome {
                warn!(
                    file = %path.display(),
                    line = line_no,
                    reason = %reason.describe(),
                    "unrepairable row quarantined"
                );
                if quarantine.is_none() {
                    quarantine = Some(
                        csv::WriterBuilder::new()
                            .flexible(true)
                            .from_writer(File::create(&sink)?),
                    );
                }
                let record = [line_no.to_string(), reason.describe()]
                    .into_iter()
                    .chain(this.iter().cloned());
                if let Some(sink_writer) = quarantine.as_mut() {
                    sink_writer.write_record(record)?;
                }
            }

            report.outcomes.push((line_no, outcome));
        }

        writer.flush()?;
    }

    if let Some(mut w) = quarantine {
        w.flush()?;
    }
    tmp.persist(path)?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::scan::scan;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    fn run_repair(content: &str) -> Result<(tempfile::TempDir, PathBuf, RepairReport)> {
        let dir = tempdir()?;
        let path = dir.path().join("marketing_1.csv");
        fs::write(&path, content)?;
        let scan = scan(&path)?;
        let report = repair(&path, &scan)?;
        Ok((dir, path, report))
    }

    #[test]
    fn merges_adjacent_spillover_pair() -> Result<()> {
        // line 3 spilled into line 4: populated counts 1 + 2 == 3
        let (_dir, path, report) = run_repair("a,b,c\n1,2,3\n4\n5,6\n7,8,9\n")?;

        assert_eq!(
            fs::read_to_string(&path)?,
            "a,b,c\n1,2,3\n4,5,6\n7,8,9\n"
        );
        assert_eq!(
            report.outcomes,
            vec![(3, RepairOutcome::Merged { partner: 4 })]
        );
        assert!(!quarantine_path(&path).exists());
        Ok(())
    }

    #[test]
    fn merged_record_is_the_ordered_concatenation_of_full_field_lists() -> Result<()> {
        // populated counts 2 + 1 == 3; empty fields survive the merge,
        // so ["4","5"] ++ ["","","6"] comes out as five physical fields
        let (_dir, path, _report) = run_repair("a,b,c\n4,5\n,,6\n")?;
        assert_eq!(fs::read_to_string(&path)?, "a,b,c\n4,5,,,6\n");
        Ok(())
    }

    #[test]
    fn width_mismatch_quarantines_both_rows() -> Result<()> {
        // counts 1 + 1 == 2, expected 3: neither row is emitted
        let (_dir, path, report) = run_repair("a,b,c\nx,\n,,z\n1,2,3\n")?;

        assert_eq!(fs::read_to_string(&path)?, "a,b,c\n1,2,3\n");
        assert_eq!(report.quarantined(), 2);
        assert_eq!(
            report.outcomes[0],
            (
                2,
                RepairOutcome::Quarantined(QuarantineReason::WidthMismatch {
                    sum: 2,
                    expected: 3
                })
            )
        );
        // row 3's partner (row 4) is intact, so no merge candidate
        assert_eq!(
            report.outcomes[1],
            (3, RepairOutcome::Quarantined(QuarantineReason::NoPartner))
        );

        let sink = fs::read_to_string(quarantine_path(&path))?;
        assert!(sink.contains("x,"));
        assert!(sink.contains(",,z"));
        assert!(sink.lines().count() == 2);
        Ok(())
    }

    #[test]
    fn lone_malformed_row_goes_to_quarantine() -> Result<()> {
        let (_dir, path, report) = run_repair("a,b,c\n1,2,3\n4,5\n")?;

        assert_eq!(fs::read_to_string(&path)?, "a,b,c\n1,2,3\n");
        assert_eq!(
            report.outcomes,
            vec![(3, RepairOutcome::Quarantined(QuarantineReason::NoPartner))]
        );
        let sink = fs::read_to_string(quarantine_path(&path))?;
        assert!(sink.starts_with("3,no adjacent malformed partner,4,5"));
        Ok(())
    }

    #[test]
    fn consumed_partner_is_not_reprocessed() -> Result<()> {
        // three consecutive malformed rows: (2,3) merge, 4 starts fresh
        // with intact line 5 as neighbour and is quarantined
        let (_dir, path, report) = run_repair("a,b,c\n1\n2,3\n4,5\n6,7,8\n")?;

        assert_eq!(fs::read_to_string(&path)?, "a,b,c\n1,2,3\n6,7,8\n");
        assert_eq!(
            report.outcomes,
            vec![
                (2, RepairOutcome::Merged { partner: 3 }),
                (4, RepairOutcome::Quarantined(QuarantineReason::NoPartner)),
            ]
        );
        Ok(())
    }

    #[test]
    fn empty_rows_are_dropped_with_notice() -> Result<()> {
        let (_dir, path, report) = run_repair("a,b,c\n1,2,3\n\n,,\n4,5\n,6\n")?;

        // blank line 3 and all-empty line 4 vanish; (5,6) merge: 2 + 1 == 3
        assert_eq!(fs::read_to_string(&path)?, "a,b,c\n1,2,3\n4,5,,6\n");
        assert_eq!(report.empty_dropped, vec![3, 4]);
        Ok(())
    }

    #[test]
    fn stale_quarantine_file_is_removed_on_a_clean_pass() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("user_1.csv");
        fs::write(&path, "a,b\n1\n,2\n")?;
        fs::write(quarantine_path(&path), "9,stale,junk\n")?;

        let scan = scan(&path)?;
        let report = repair(&path, &scan)?;

        assert_eq!(report.merged(), 1);
        assert!(!quarantine_path(&path).exists());
        Ok(())
    }
}
