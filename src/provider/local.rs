//! Folder of numbered images (`0.png`, `1.png`, ...).

use std::path::{Path, PathBuf};

use log::trace;

use super::{FetchError, PageProvider};
use crate::page::{Page, PageId};

pub const DEFAULT_EXTENSION: &str = "png";

pub struct LocalProvider {
    folder: PathBuf,
    extension: String,
    name: String,
}

impl LocalProvider {
    pub fn new(folder: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let folder = folder.into();
        let name = folder
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("local")
            .to_string();
        Self {
            folder,
            extension: extension.into(),
            name,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn page_path(&self, n: u64) -> PathBuf {
        self.folder.join(format!("{n}.{}", self.extension))
    }

    fn exists(&self, n: u64) -> bool {
        self.page_path(n).is_file()
    }
}

impl PageProvider for LocalProvider {
    fn load(&self, id: &PageId) -> Result<Page, FetchError> {
        let n = match id {
            PageId::Number(n) => *n,
            PageId::Url(u) => return Err(FetchError::InvalidId(u.clone())),
        };
        let path = self.page_path(n);
        let content = std::fs::read(&path).map_err(|source| FetchError::Io {
            path: path.clone(),
            source,
        })?;
        trace!("local: read {} ({} bytes)", path.display(), content.len());

        let next = n
            .checked_add(1)
            .filter(|&m| self.exists(m))
            .map(PageId::Number);
        let previous = n
            .checked_sub(1)
            .filter(|&m| self.exists(m))
            .map(PageId::Number);
        Ok(Page::new(PageId::Number(n), content, next, previous))
    }

    fn parse_id(&self, text: &str) -> Result<PageId, FetchError> {
        text.trim()
            .parse::<u64>()
            .map(PageId::Number)
            .map_err(|_| FetchError::InvalidId(text.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder_with(pages: &[u64]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for n in pages {
            std::fs::write(dir.path().join(format!("{n}.png")), format!("page {n}")).unwrap();
        }
        dir
    }

    #[test]
    fn loads_content_and_links() {
        let dir = folder_with(&[0, 1, 2]);
        let provider = LocalProvider::new(dir.path(), "png");
        let page = provider.load(&PageId::Number(1)).unwrap();
        assert_eq!(page.content(), b"page 1");
        assert_eq!(page.next(), Some(&PageId::Number(2)));
        assert_eq!(page.previous(), Some(&PageId::Number(0)));
    }

    #[test]
    fn ends_have_no_neighbour() {
        let dir = folder_with(&[0, 1]);
        let provider = LocalProvider::new(dir.path(), "png");
        let first = provider.load(&PageId::Number(0)).unwrap();
        assert!(!first.has_previous());
        let last = provider.load(&PageId::Number(1)).unwrap();
        assert!(!last.has_next());
    }

    #[test]
    fn gap_ends_the_sequence() {
        let dir = folder_with(&[0, 1, 3]);
        let provider = LocalProvider::new(dir.path(), "png");
        let page = provider.load(&PageId::Number(1)).unwrap();
        assert!(!page.has_next());
    }

    #[test]
    fn missing_page_is_io_error() {
        let dir = folder_with(&[0]);
        let provider = LocalProvider::new(dir.path(), "png");
        let err = provider.load(&PageId::Number(7)).unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[test]
    fn extension_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0.jpg"), b"jpeg").unwrap();
        let provider = LocalProvider::new(dir.path(), "jpg");
        assert_eq!(provider.load(&PageId::Number(0)).unwrap().content(), b"jpeg");
    }

    #[test]
    fn url_ids_are_rejected() {
        let dir = folder_with(&[0]);
        let provider = LocalProvider::new(dir.path(), "png");
        let err = provider
            .load(&PageId::Url("https://comic.invalid/".into()))
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidId(_)));
    }

    #[test]
    fn parse_id() {
        let provider = LocalProvider::new("/nonexistent", "png");
        assert_eq!(provider.parse_id(" 12\n").unwrap(), PageId::Number(12));
        assert!(provider.parse_id("twelve").is_err());
    }
}
