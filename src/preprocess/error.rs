use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions for a single file's preprocessing pipeline.
///
/// A `PreprocessError` aborts the pipeline for the file it names and is
/// reported to the caller; it never aborts the batch. Malformed and empty
/// rows are expected conditions, not errors, and are carried in the stage
/// reports instead.
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// A line is not valid UTF-8 even after NUL bytes are removed.
    #[error("{file}: line {line} is not valid UTF-8 after NUL removal")]
    Decode {
        file: PathBuf,
        line: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    /// The file has no header line, so no schema can be established.
    #[error("{file}: file is empty, no header to derive a schema from")]
    EmptyFile { file: PathBuf },

    #[error("CSV parse error")]
    Csv(#[from] csv::Error),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// The write-temp-then-rename replacement failed; the original file
    /// is untouched and the temporary has been cleaned up.
    #[error("atomic file replace failed")]
    Persist(#[from] tempfile::PersistError),
}
