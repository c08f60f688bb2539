//! Web comic pages: fetch HTML, pick image and neighbour links with CSS
//! selectors, then fetch the image.

use std::time::Duration;

use log::{debug, trace};
use scraper::{Html, Selector};
use url::Url;

use super::{FetchError, PageProvider};
use crate::page::{Page, PageId};

/// Images above this size are refused rather than buffered.
const MAX_IMAGE_BYTES: u64 = 32 * 1024 * 1024;

/// CSS selectors for the three elements a comic page must expose.
#[derive(Debug, Clone)]
pub struct Selectors {
    pub image: Selector,
    pub next: Selector,
    pub previous: Selector,
}

impl Selectors {
    pub fn parse(image: &str, next: &str, previous: &str) -> anyhow::Result<Self> {
        Ok(Self {
            image: parse_selector(image)?,
            next: parse_selector(next)?,
            previous: parse_selector(previous)?,
        })
    }
}

fn parse_selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("invalid CSS selector {css:?}: {e}"))
}

/// Absolute URLs scraped from one HTML page.
#[derive(Debug, PartialEq, Eq)]
pub struct ScrapedLinks {
    pub image: Option<String>,
    pub next: Option<String>,
    pub previous: Option<String>,
}

/// Extract image source and neighbour links from `html`.
///
/// Every attribute is resolved against `page_url`, which covers relative,
/// absolute-path, protocol-relative and full URLs alike. A neighbour link
/// that is empty or points back at the page itself counts as absent.
pub fn scrape(html: &str, page_url: &Url, selectors: &Selectors) -> ScrapedLinks {
    let doc = Html::parse_document(html);
    let attr = |selector: &Selector, name: &str| -> Option<Url> {
        let raw = doc.select(selector).next()?.value().attr(name)?.trim();
        if raw.is_empty() {
            return None;
        }
        page_url.join(raw).ok()
    };

    let neighbour = |selector: &Selector| {
        attr(selector, "href")
            .filter(|u| !same_page(u, page_url))
            .map(String::from)
    };

    ScrapedLinks {
        image: attr(&selectors.image, "src").map(String::from),
        next: neighbour(&selectors.next),
        previous: neighbour(&selectors.previous),
    }
}

fn same_page(a: &Url, b: &Url) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b
}

/// HTTP client settings shared by all remote series.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub user_agent: String,
}

pub struct RemoteProvider {
    agent: ureq::Agent,
    selectors: Selectors,
    name: String,
}

impl RemoteProvider {
    pub fn new(name: impl Into<String>, selectors: Selectors, http: &HttpSettings) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(http.timeout))
            .user_agent(http.user_agent.as_str())
            .build()
            .into();
        Self {
            agent,
            selectors,
            name: name.into(),
        }
    }

    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let mut resp = self.agent.get(url).call().map_err(|e| http_error(url, e))?;
        resp.body_mut()
            .read_to_string()
            .map_err(|e| http_error(url, e))
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut resp = self.agent.get(url).call().map_err(|e| http_error(url, e))?;
        resp.body_mut()
            .with_config()
            .limit(MAX_IMAGE_BYTES)
            .read_to_vec()
            .map_err(|e| http_error(url, e))
    }
}

fn http_error(url: &str, source: ureq::Error) -> FetchError {
    FetchError::Http {
        url: url.to_string(),
        source: Box::new(source),
    }
}

impl PageProvider for RemoteProvider {
    fn load(&self, id: &PageId) -> Result<Page, FetchError> {
        let url = match id {
            PageId::Url(u) => u.as_str(),
            PageId::Number(n) => return Err(FetchError::InvalidId(n.to_string())),
        };
        let page_url = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let html = self.get_text(url)?;
        let links = scrape(&html, &page_url, &self.selectors);
        debug!(
            "remote: {url} -> image={:?} next={:?} previous={:?}",
            links.image, links.next, links.previous
        );

        let image_url = links.image.ok_or_else(|| FetchError::MissingImage {
            url: url.to_string(),
        })?;
        let content = self.get_bytes(&image_url)?;
        trace!("remote: {image_url} ({} bytes)", content.len());

        Ok(Page::new(
            id.clone(),
            content,
            links.next.map(PageId::Url),
            links.previous.map(PageId::Url),
        ))
    }

    fn parse_id(&self, text: &str) -> Result<PageId, FetchError> {
        let text = text.trim();
        Url::parse(text)
            .map(|u| PageId::Url(u.into()))
            .map_err(|source| FetchError::InvalidUrl {
                url: text.to_string(),
                source,
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
