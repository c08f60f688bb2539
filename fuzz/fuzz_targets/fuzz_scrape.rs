#![no_main]

use libfuzzer_sys::fuzz_target;
use pageturn::provider::remote::{Selectors, scrape};
use url::Url;

fuzz_target!(|data: &[u8]| {
    let Ok(html) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(page_url) = Url::parse("https://comic.invalid/strip/42?x=1") else {
        return;
    };
    let Ok(selectors) = Selectors::parse("img", "a[rel=next]", "a[rel=prev]") else {
        return;
    };

    // Must not panic on arbitrary markup.
    let links = scrape(html, &page_url, &selectors);

    // Every link that survives is absolute and never points back at the page itself.
    for link in [&links.image, &links.next, &links.previous].into_iter().flatten() {
        if let Err(e) = Url::parse(link) {
            panic!("relative link {link:?}: {e}");
        }
    }
    for link in [&links.next, &links.previous].into_iter().flatten() {
        let mut parsed = Url::parse(link).unwrap_or_else(|e| panic!("{link:?}: {e}"));
        parsed.set_fragment(None);
        assert_ne!(parsed, page_url, "self link kept: {link}");
    }
});
