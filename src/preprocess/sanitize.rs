// src/preprocess/sanitize.rs
use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::preprocess::error::PreprocessError;

/// Strip embedded NUL bytes from every line of `path`, validating that
/// each line decodes as UTF-8 once the NULs are gone.
///
/// This is a pure subtraction: surviving bytes keep their order, and no
/// CSV re-quoting or newline normalisation happens here. The file is
/// replaced atomically (write to a sibling temp file, then rename), and
/// only when at least one NUL was actually removed, so a clean file
/// round-trips byte-identical.
///
/// Returns the number of NUL bytes removed.
pub fn sanitize(path: &Path) -> Result<u64, PreprocessError> {
    let raw = fs::read(path)?;

    let mut cleaned: Vec<u8> = Vec::with_capacity(raw.len());
    let mut removed: u64 = 0;

    for (idx, chunk) in raw.split_inclusive(|&b| b == b'\n').enumerate() {
        let line_no = idx + 1;
        let before = cleaned.len();
        cleaned.extend(chunk.iter().copied().filter(|&b| b != 0));
        let kept = &cleaned[before..];
        removed += (chunk.len() - kept.len()) as u64;

        if let Err(source) = std::str::from_utf8(kept) {
            return Err(PreprocessError::Decode {
                file: path.to_path_buf(),
                line: line_no,
                source,
            });
        }
    }

    if removed == 0 {
        debug!(file = %path.display(), "no NUL bytes found");
        return Ok(0);
    }

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(&cleaned)?;
    tmp.flush()?;
    tmp.persist(path)?;

    info!(file = %path.display(), removed, "stripped NUL bytes");
    Ok(removed)
}
