//! Page value: one image plus its links to neighbouring pages.
//!
//! A `Page` never changes after a provider builds it. The prefetch cache
//! shares pages as `Arc<Page>` between the consumer and the fetch worker.

use std::fmt;

/// Provider-defined page identifier.
///
/// Local series number their pages; remote series address them by URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageId {
    Number(u64),
    Url(String),
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageId::Number(n) => write!(f, "{n}"),
            PageId::Url(u) => f.write_str(u),
        }
    }
}

/// A loaded page.
///
/// `next` / `previous` are discovered while loading (file existence for
/// local pages, scraped links for remote pages), so asking whether a page
/// has a neighbour never triggers a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    id: PageId,
    content: Vec<u8>,
    next: Option<PageId>,
    previous: Option<PageId>,
}

impl Page {
    pub fn new(
        id: PageId,
        content: Vec<u8>,
        next: Option<PageId>,
        previous: Option<PageId>,
    ) -> Self {
        Self {
            id,
            content,
            next,
            previous,
        }
    }

    pub fn id(&self) -> &PageId {
        &self.id
    }

    /// Raw image bytes as delivered by the provider.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn next(&self) -> Option<&PageId> {
        self.next.as_ref()
    }

    pub fn previous(&self) -> Option<&PageId> {
        self.previous.as_ref()
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    /// True if `other` links forward to this page.
    pub fn is_next_of(&self, other: &Page) -> bool {
        other.next.as_ref() == Some(&self.id)
    }

    /// True if `other` links backward to this page.
    pub fn is_previous_of(&self, other: &Page) -> bool {
        other.previous.as_ref() == Some(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: u64, last: u64) -> Page {
        Page::new(
            PageId::Number(n),
            vec![n as u8],
            (n < last).then(|| PageId::Number(n + 1)),
            n.checked_sub(1).map(PageId::Number),
        )
    }

    #[test]
    fn neighbours_from_linkage() {
        let first = numbered(0, 2);
        assert!(first.has_next());
        assert!(!first.has_previous());

        let last = numbered(2, 2);
        assert!(!last.has_next());
        assert!(last.has_previous());
    }

    #[test]
    fn adjacency_checks_other_pages_links() {
        let a = numbered(3, 9);
        let b = numbered(4, 9);
        assert!(b.is_next_of(&a));
        assert!(a.is_previous_of(&b));
        assert!(!a.is_next_of(&b));
        assert!(!b.is_previous_of(&a));
        assert!(!numbered(6, 9).is_next_of(&a));
    }

    #[test]
    fn url_adjacency() {
        let a = Page::new(
            PageId::Url("https://comic.invalid/1".into()),
            Vec::new(),
            Some(PageId::Url("https://comic.invalid/2".into())),
            None,
        );
        let b = Page::new(
            PageId::Url("https://comic.invalid/2".into()),
            Vec::new(),
            None,
            Some(PageId::Url("https://comic.invalid/1".into())),
        );
        assert!(b.is_next_of(&a));
        assert!(a.is_previous_of(&b));
    }

    #[test]
    fn display_is_bookmark_text() {
        assert_eq!(PageId::Number(42).to_string(), "42");
        assert_eq!(
            PageId::Url("https://comic.invalid/42".into()).to_string(),
            "https://comic.invalid/42"
        );
    }
}
