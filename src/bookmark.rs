//! Single-line bookmark files holding the id of the last viewed page.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

/// Read the bookmarked id, or `None` if the file is missing or blank.
pub fn load(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let id = text.lines().next().map(str::trim).unwrap_or_default();
            if id.is_empty() {
                debug!("bookmark: {} is empty", path.display());
                Ok(None)
            } else {
                debug!("bookmark: {} -> {id}", path.display());
                Ok(Some(id.to_string()))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read bookmark {}", path.display())),
    }
}

/// Overwrite the bookmark with `id`.
///
/// Written to a sibling temp file and renamed into place, so a crash mid-write
/// leaves the previous bookmark intact.
pub fn save(path: &Path, id: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    {
        let mut f = std::fs::File::create(&tmp)
            .with_context(|| format!("failed to create {}", tmp.display()))?;
        writeln!(f, "{id}").with_context(|| format!("failed to write {}", tmp.display()))?;
        f.sync_all()
            .with_context(|| format!("failed to sync {}", tmp.display()))?;
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace bookmark {}", path.display()))?;
    debug!("bookmark: saved {id} to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_save_keeps_previous_bookmark() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.bookmark");
        save(&path, "4").unwrap();
        assert!(!dir.path().join("book.tmp").exists());

        // Temp file slot taken by a directory: the write must fail loudly.
        std::fs::create_dir(dir.path().join("book.tmp")).unwrap();
        assert!(save(&path, "5").is_err());
        assert_eq!(load(&path).unwrap().as_deref(), Some("4"));
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load(&dir.path().join("nope.bookmark")).unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/comic.bookmark");
        save(&path, "https://comic.invalid/7").unwrap();
        assert_eq!(load(&path).unwrap().as_deref(), Some("https://comic.invalid/7"));

        save(&path, "8").unwrap();
        assert_eq!(load(&path).unwrap().as_deref(), Some("8"));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn only_first_line_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b");
        std::fs::write(&path, "  12 \nleftover\n").unwrap();
        assert_eq!(load(&path).unwrap().as_deref(), Some("12"));
    }

    #[test]
    fn blank_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b");
        std::fs::write(&path, "\n").unwrap();
        assert_eq!(load(&path).unwrap(), None);
    }
}
