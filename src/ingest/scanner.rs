use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const NAME_STAMP_LEN: usize = 19;
const NAME_STAMP_FORMAT: &str = "%Y-%m-%dT%H_%M_%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub name: String,
    /// Local time encoded in the first 19 characters of the name.
    pub name_stamp: Option<NaiveDateTime>,
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub candidates: Vec<ArchiveFile>,
    pub skipped: usize,
}

pub fn parse_name_stamp(name: &str) -> Option<NaiveDateTime> {
    name.get(..NAME_STAMP_LEN)
        .and_then(|prefix| NaiveDateTime::parse_from_str(prefix, NAME_STAMP_FORMAT).ok())
}

/// Lists regular files in `dir`, ordered by name. With a cursor, files whose
/// name stamp is strictly earlier are skipped in full, even if their content
/// runs past the cursor.
pub fn scan_archive(dir: &Path, cursor: Option<NaiveDateTime>) -> Result<ScanResult> {
    let mut files = list_archive(dir)?;
    files.sort_by(|left, right| left.name.cmp(&right.name));

    let Some(cursor) = cursor else {
        return Ok(ScanResult {
            candidates: files,
            skipped: 0,
        });
    };

    let mut result = ScanResult::default();
    for file in files {
        let Some(stamp) = file.name_stamp else {
            bail!(
                "Archive file name does not start with a YYYY-MM-DDTHH_MM_SS timestamp: {}",
                file.path.display()
            );
        };

        if stamp < cursor {
            debug!(file = %file.name, %stamp, %cursor, "archive file older than cursor, skipped");
            result.skipped += 1;
        } else {
            result.candidates.push(file);
        }
    }

    Ok(result)
}

fn list_archive(dir: &Path) -> Result<Vec<ArchiveFile>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read archive directory: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| {
            format!("Failed to read archive directory entry: {}", dir.display())
        })?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("Failed to stat archive entry: {}", entry.path().display()))?;
        if !file_type.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        files.push(ArchiveFile {
            path: entry.path(),
            name_stamp: parse_name_stamp(&name),
            name,
        });
    }

    Ok(files)
}
