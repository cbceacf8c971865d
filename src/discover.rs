use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;
use tracing::warn;

/// List the `*.csv` files under `dir`, sorted for a deterministic
/// processing order. Quarantine sinks use a `.quarantine` extension so
/// they never match here.
pub fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.csv", dir.display());

    let mut files = Vec::new();
    for entry in glob(&pattern).context("invalid glob pattern for csv_files")? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("cannot read glob entry: {e:?}"),
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn finds_only_csv_files_sorted() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("user_1.csv"), "a\n")?;
        fs::write(dir.path().join("marketing_1.csv"), "a\n")?;
        fs::write(dir.path().join("marketing_1.csv.quarantine"), "x\n")?;
        fs::write(dir.path().join("notes.txt"), "x\n")?;

        let files = csv_files(dir.path())?;
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["marketing_1.csv", "user_1.csv"]);
        Ok(())
    }

    #[test]
    fn empty_directory_yields_no_files() -> Result<()> {
        let dir = tempdir()?;
        assert!(csv_files(dir.path())?.is_empty());
        Ok(())
    }
}
