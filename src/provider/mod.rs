//! Page providers: turn a `PageId` into a loaded `Page`.
//!
//! The prefetch cache only sees `dyn PageProvider`; whether pages come from
//! numbered files on disk or from scraped web pages is decided by the series
//! file.

pub mod local;
pub mod remote;

use std::path::PathBuf;

use crate::page::{Page, PageId};

/// Failure to retrieve a single page.
///
/// Inside the fetch worker these are transient: logged and retried on the
/// next iteration.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("no image found on {url}")]
    MissingImage { url: String },

    #[error("invalid page id {0:?}")]
    InvalidId(String),
}

/// Capability that materialises pages.
pub trait PageProvider: Send + Sync {
    /// Fetch the page and discover its neighbour links.
    fn load(&self, id: &PageId) -> Result<Page, FetchError>;

    /// Parse bookmark text into an id this provider understands.
    fn parse_id(&self, text: &str) -> Result<PageId, FetchError>;

    /// Short label for logs and the status bar.
    fn name(&self) -> &str;
}
