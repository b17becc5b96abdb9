//! Staged files: the ordered set of local files selected for the next
//! embedding batch. Append-only until removal, never deduplicated.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// One file selected for submission. Bytes are read lazily at submit time.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl StagedFile {
    fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(Error::Staging(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
        })
    }
}

/// Ordered collection of staged files.
#[derive(Debug, Default)]
pub struct FileStaging {
    files: Vec<StagedFile>,
}

impl FileStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append files in order and return the count added. A directory stages
    /// every regular file beneath it. Staging the same file twice yields two
    /// entries. The append is all-or-nothing: one bad path in the batch
    /// stages none of it.
    pub fn add(&mut self, paths: &[PathBuf]) -> Result<usize> {
        let mut incoming = Vec::new();
        for path in paths {
            if path.is_dir() {
                for entry in WalkDir::new(path).sort_by_file_name() {
                    let entry = entry.map_err(|e| Error::Staging(e.to_string()))?;
                    if entry.file_type().is_file() {
                        incoming.push(StagedFile::from_path(entry.path())?);
                    }
                }
            } else {
                incoming.push(StagedFile::from_path(path)?);
            }
        }

        let added = incoming.len();
        self.files.extend(incoming);
        debug!("Staged {} file(s), {} total", added, self.files.len());
        Ok(added)
    }

    /// Remove one entry by position, keeping relative order of the rest.
    pub fn remove(&mut self, index: usize) -> Option<StagedFile> {
        if index < self.files.len() {
            Some(self.files.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }
}

/// Human-readable size in base-1024 units, at most two decimal places with
/// trailing zeros dropped. Zero is exactly "0 Bytes".
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exponent = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && exponent < UNITS.len() - 1 {
        value /= 1024.0;
        exponent += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, len: usize) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![b'x'; len]).unwrap();
        path
    }

    #[test]
    fn add_preserves_order_and_never_dedupes() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.txt", 10);
        let b = write_file(&dir, "b.txt", 20);

        let mut staging = FileStaging::new();
        assert_eq!(staging.add(&[a.clone(), b.clone()]).unwrap(), 2);
        assert_eq!(staging.add(&[a.clone()]).unwrap(), 1);

        let names: Vec<&str> = staging.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "a.txt"]);
    }

    #[test]
    fn remove_keeps_relative_order() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = ["a.txt", "b.txt", "c.txt", "d.txt"]
            .iter()
            .map(|n| write_file(&dir, n, 1))
            .collect();

        let mut staging = FileStaging::new();
        staging.add(&paths).unwrap();

        let removed = staging.remove(1).unwrap();
        assert_eq!(removed.name, "b.txt");

        let names: Vec<&str> = staging.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "c.txt", "d.txt"]);

        assert!(staging.remove(10).is_none());
    }

    #[test]
    fn clear_empties_the_collection() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.txt", 1);

        let mut staging = FileStaging::new();
        staging.add(&[a]).unwrap();
        staging.clear();
        assert!(staging.is_empty());
    }

    #[test]
    fn directory_argument_stages_files_beneath_it() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "one.md", 5);
        write_file(&dir, "two.md", 5);

        let mut staging = FileStaging::new();
        let added = staging.add(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(added, 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut staging = FileStaging::new();
        assert!(staging.add(&[PathBuf::from("/no/such/file")]).is_err());
        assert!(staging.is_empty());
    }

    #[test]
    fn bad_path_in_a_batch_stages_nothing() {
        let dir = TempDir::new().unwrap();
        let good = write_file(&dir, "a.txt", 10);

        let mut staging = FileStaging::new();
        let result = staging.add(&[good, PathBuf::from("/no/such/file")]);
        assert!(result.is_err());
        // The good file must not ride along on the next submit.
        assert!(staging.is_empty());

        let existing = write_file(&dir, "b.txt", 5);
        staging.add(&[existing.clone()]).unwrap();
        assert!(staging
            .add(&[PathBuf::from("/no/such/file"), existing])
            .is_err());
        assert_eq!(staging.len(), 1);
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024), "5 GB");
    }

    #[test]
    fn size_units_never_shrink_as_bytes_grow() {
        const ORDER: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
        let unit_rank = |s: &str| {
            ORDER
                .iter()
                .position(|u| s.ends_with(u))
                .expect("known unit")
        };

        let mut last_rank = 0;
        for power in 0..4 {
            let formatted = format_file_size(1024u64.pow(power));
            let rank = unit_rank(&formatted);
            assert!(rank >= last_rank, "{} regressed to a smaller unit", formatted);
            last_rank = rank;
        }
    }
}
