//! Article link discovery on blog listing pages.
//!
//! Anchors are collected with an ordered list of selectors: path patterns
//! (`/blog/`, `/post/`, ...) and structural positions (headings, post titles,
//! anchors inside article containers). Every candidate is resolved against the
//! listing URL and kept only when it is same-origin, not a fragment, not the
//! listing itself and not an author/tag/category/pagination page.
//!
//! If the curated selectors find nothing, every relative anchor on the page is
//! considered as a last resort. Output is deduplicated in first-seen order and
//! never capped here; callers decide how many links to follow.

use crate::error::Result;
use crate::fetcher::{Fetcher, Transport};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const LINK_SELECTORS: &[&str] = &[
    r#"a[href*="/blog/"]"#,
    r#"a[href*="/blogs/"]"#,
    "article a[href]",
    ".post a[href]",
    ".article a[href]",
    ".entry-title a[href]",
    "h2 a[href]",
    "h3 a[href]",
    ".post-title a[href]",
    ".post-header a[href]",
    r#"a[href*="/article/"]"#,
    r#"a[href*="/post/"]"#,
    r#"a[href*="/news/"]"#,
];

/// Path segments that mark index pages rather than articles.
pub const EXCLUDED_SEGMENTS: &[&str] = &["/author/", "/tag/", "/category/", "/page/"];

static CURATED: Lazy<Vec<Selector>> = Lazy::new(|| {
    LINK_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).expect("valid link selector"))
        .collect()
});

static ANY_ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

/// Fetch a listing page and return its candidate article links.
///
/// Links come back absolute, without fragments, deduplicated and in page
/// order. See [`extract_article_links`] for the filters.
#[instrument(level = "info", skip_all, fields(%listing_url))]
pub async fn discover_links<T: Transport>(
    fetcher: &Fetcher<T>,
    listing_url: &Url,
) -> Result<Vec<Url>> {
    let page = fetcher.fetch(listing_url).await?;
    let links = extract_article_links(&Html::parse_document(&page.body), listing_url);
    info!(count = links.len(), "Discovered article links");
    Ok(links)
}

/// Candidate article links of an already-parsed listing page.
pub fn extract_article_links(document: &Html, listing_url: &Url) -> Vec<Url> {
    let listing = without_fragment(listing_url);

    let curated: Vec<Url> = CURATED
        .iter()
        .flat_map(|selector| document.select(selector))
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| accept(href, &listing))
        .unique()
        .collect();

    if !curated.is_empty() {
        debug!(count = curated.len(), "Curated selectors matched");
        return curated;
    }

    warn!("No article links found with curated selectors; scanning all anchors");
    document
        .select(&ANY_ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| !looks_absolute(href))
        .filter_map(|href| accept(href, &listing))
        .unique()
        .collect()
}

/// Resolve `href` and apply the article-link filters.
fn accept(href: &str, listing: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let resolved = match listing.join(href) {
        Ok(url) => without_fragment(&url),
        Err(e) => {
            debug!(%href, error = %e, "Skipping unresolvable link");
            return None;
        }
    };
    if resolved.origin() != listing.origin() || resolved == *listing {
        return None;
    }
    if EXCLUDED_SEGMENTS
        .iter()
        .any(|segment| resolved.path().contains(segment))
    {
        return None;
    }
    Some(resolved)
}

fn looks_absolute(href: &str) -> bool {
    let href = href.trim_start();
    href.get(..4)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http"))
        || href.starts_with("//")
}

fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}
