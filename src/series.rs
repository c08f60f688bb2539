//! Series files: which provider to use and where its bookmark lives.
//!
//! ```toml
//! bookmark = "saves/dungeon.bookmark"   # optional
//! start = "https://comic.invalid/1"     # used when there is no bookmark yet
//!
//! [source]
//! type = "remote"
//! image = "#comic img"
//! next = "a[rel=next]"
//! previous = "a[rel=prev]"
//! ```
//!
//! Relative paths are resolved against the directory holding the series file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::bookmark;
use crate::page::{Page, PageId};
use crate::provider::PageProvider;
use crate::provider::local::{self, LocalProvider};
use crate::provider::remote::{HttpSettings, RemoteProvider, Selectors};

pub const EXTENSION: &str = "toml";

#[derive(Debug, Serialize, Deserialize)]
struct SeriesFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bookmark: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start: Option<String>,
    source: Source,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Source {
    Local {
        folder: PathBuf,
        #[serde(default = "default_extension")]
        extension: String,
    },
    Remote {
        image: String,
        next: String,
        previous: String,
    },
}

fn default_extension() -> String {
    local::DEFAULT_EXTENSION.to_string()
}

/// A parsed series file with paths made absolute.
#[derive(Debug)]
pub struct Series {
    pub name: String,
    pub bookmark: PathBuf,
    pub start: Option<String>,
    pub source: Source,
}

impl Series {
    /// Parse the series file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read series {}", path.display()))?;
        let file: SeriesFile = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;

        let name = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("series")
            .to_string();
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let bookmark = match file.bookmark {
            Some(p) => base.join(p),
            None => base.join(format!("{name}.bookmark")),
        };
        let source = match file.source {
            Source::Local { folder, extension } => Source::Local {
                folder: base.join(folder),
                extension,
            },
            remote @ Source::Remote { .. } => remote,
        };
        debug!("series: {name} from {} ({source:?})", path.display());
        Ok(Self {
            name,
            bookmark,
            start: file.start,
            source,
        })
    }

    /// Open `name` from `dir`. A path to an existing file is accepted as is.
    pub fn open(dir: &Path, name: &str) -> Result<Self> {
        let direct = Path::new(name);
        if direct.is_file() {
            return Self::load(direct);
        }
        Self::load(&dir.join(format!("{name}.{EXTENSION}")))
    }

    /// Build the provider described by `[source]`.
    pub fn provider(&self, http: &HttpSettings) -> Result<Arc<dyn PageProvider>> {
        let provider: Arc<dyn PageProvider> = match &self.source {
            Source::Local { folder, extension } => {
                if !folder.is_dir() {
                    anyhow::bail!("series {}: {} is not a directory", self.name, folder.display());
                }
                Arc::new(LocalProvider::new(folder, extension.as_str()))
            }
            Source::Remote {
                image,
                next,
                previous,
            } => {
                let selectors = Selectors::parse(image, next, previous)
                    .with_context(|| format!("series {}", self.name))?;
                Arc::new(RemoteProvider::new(self.name.as_str(), selectors, http))
            }
        };
        Ok(provider)
    }

    /// The page to open: the bookmark if present, else `start`.
    ///
    /// Local series without either start at page 0.
    pub fn seed_id(&self, provider: &dyn PageProvider) -> Result<PageId> {
        let text = match bookmark::load(&self.bookmark)? {
            Some(id) => id,
            None => match (&self.start, &self.source) {
                (Some(start), _) => start.clone(),
                (None, Source::Local { .. }) => "0".to_string(),
                (None, Source::Remote { .. }) => anyhow::bail!(
                    "series {}: no bookmark at {} and no `start` page",
                    self.name,
                    self.bookmark.display()
                ),
            },
        };
        provider
            .parse_id(&text)
            .with_context(|| format!("series {}: bad page id", self.name))
    }

    /// Resolve and load the seed page. Failure here is fatal for the caller.
    pub fn load_seed(&self, provider: &dyn PageProvider) -> Result<Page> {
        let id = self.seed_id(provider)?;
        info!("series {}: opening at {id}", self.name);
        provider
            .load(&id)
            .with_context(|| format!("series {}: failed to load page {id}", self.name))
    }

    pub fn save_bookmark(&self, id: &PageId) -> Result<()> {
        bookmark::save(&self.bookmark, &id.to_string())
    }
}

/// Series names in `dir`, sorted.
pub fn list(dir: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("failed to list {}", dir.display())),
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|e| e == EXTENSION))
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
        .collect();
    names.sort();
    Ok(names)
}

/// Write a series file for a folder of numbered images, with a bookmark at
/// page 0. Returns the path of the new series file.
pub fn write_local(dir: &Path, name: &str, folder: &Path, extension: &str) -> Result<PathBuf> {
    let folder = folder
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", folder.display()))?;
    if !folder.join(format!("0.{extension}")).is_file() {
        anyhow::bail!("{} has no 0.{extension}", folder.display());
    }

    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(format!("{name}.{EXTENSION}"));
    if path.exists() {
        anyhow::bail!("series {} already exists", path.display());
    }
    let file = SeriesFile {
        bookmark: None,
        start: Some("0".into()),
        source: Source::Local {
            folder,
            extension: extension.to_string(),
        },
    };
    let text = toml::to_string(&file).context("failed to serialize series file")?;
    std::fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
    bookmark::save(&dir.join(format!("{name}.bookmark")), "0")?;
    info!("series: wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(dir: &Path, count: u64) {
        std::fs::create_dir_all(dir).unwrap();
        for n in 0..count {
            std::fs::write(dir.join(format!("{n}.png")), [n as u8]).unwrap();
        }
    }

    #[test]
    fn local_paths_resolve_against_series_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("book.toml"),
            "[source]\ntype = \"local\"\nfolder = \"pages\"\n",
        )
        .unwrap();
        let series = Series::open(dir.path(), "book").unwrap();
        assert_eq!(series.name, "book");
        assert_eq!(series.bookmark, dir.path().join("book.bookmark"));
        assert_eq!(
            series.source,
            Source::Local {
                folder: dir.path().join("pages"),
                extension: "png".into()
            }
        );
    }

    #[test]
    fn remote_series_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.toml");
        std::fs::write(
            &path,
            r##"
                bookmark = "saves/web.txt"
                start = "https://comic.invalid/1"
                [source]
                type = "remote"
                image = "#comic img"
                next = "a.next"
                previous = "a.prev"
            "##,
        )
        .unwrap();
        let series = Series::load(&path).unwrap();
        assert_eq!(series.bookmark, dir.path().join("saves/web.txt"));
        assert_eq!(series.start.as_deref(), Some("https://comic.invalid/1"));
        assert!(matches!(series.source, Source::Remote { .. }));
    }

    #[test]
    fn unknown_source_type_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[source]\ntype = \"ftp\"\n").unwrap();
        assert!(Series::load(&path).is_err());
    }

    #[test]
    fn seed_prefers_bookmark() {
        let dir = tempfile::tempdir().unwrap();
        pages(&dir.path().join("pages"), 5);
        let path = write_local(dir.path(), "book", &dir.path().join("pages"), "png").unwrap();
        let series = Series::load(&path).unwrap();
        let provider = series.provider(&test_http()).unwrap();
        assert_eq!(series.seed_id(provider.as_ref()).unwrap(), PageId::Number(0));

        series.save_bookmark(&PageId::Number(3)).unwrap();
        let seed = series.load_seed(provider.as_ref()).unwrap();
        assert_eq!(seed.id(), &PageId::Number(3));
        assert_eq!(seed.content(), [3u8]);
    }

    #[test]
    fn remote_without_start_or_bookmark_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.toml");
        std::fs::write(
            &path,
            "[source]\ntype = \"remote\"\nimage = \"img\"\nnext = \"a.n\"\nprevious = \"a.p\"\n",
        )
        .unwrap();
        let series = Series::load(&path).unwrap();
        let provider = series.provider(&test_http()).unwrap();
        assert!(series.seed_id(provider.as_ref()).is_err());
    }

    #[test]
    fn missing_local_folder_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.toml");
        std::fs::write(&path, "[source]\ntype = \"local\"\nfolder = \"nowhere\"\n").unwrap();
        let series = Series::load(&path).unwrap();
        assert!(series.provider(&test_http()).is_err());
    }

    #[test]
    fn write_local_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        pages(&dir.path().join("pages"), 1);
        write_local(dir.path(), "book", &dir.path().join("pages"), "png").unwrap();
        assert!(write_local(dir.path(), "book", &dir.path().join("pages"), "png").is_err());
    }

    #[test]
    fn list_sorted_toml_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.toml", "a.toml", "a.bookmark", "notes.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        assert_eq!(list(dir.path()).unwrap(), vec!["a", "b"]);
        assert!(list(&dir.path().join("missing")).unwrap().is_empty());
    }

    fn test_http() -> HttpSettings {
        HttpSettings {
            timeout: std::time::Duration::from_secs(1),
            user_agent: "test".into(),
        }
    }
}
