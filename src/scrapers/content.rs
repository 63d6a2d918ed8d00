//! Main-content extraction from arbitrary HTML.
//!
//! Pages are not assumed to be semantic. The extractor walks an ordered list
//! of container selectors, article-like first and generic last, and accepts
//! the first container whose cleaned text is longer than
//! [`MIN_CONTENT_LEN`] characters. There is no scoring across candidates:
//! priority order alone breaks ties. When nothing clears the threshold, the
//! whole `<body>` is used instead.
//!
//! Noise elements (scripts, navigation, forms, ads, comment widgets, ...) are
//! skipped while rendering text rather than removed from the tree, so the same
//! [`Html`] can still be handed to the metadata extractor afterwards.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Text at or below this length does not win a content selector.
pub const MIN_CONTENT_LEN: usize = 100;

/// Elements whose subtrees never contribute text.
pub const NOISE_SELECTORS: &[&str] = &[
    "script",
    "style",
    "iframe",
    "noscript",
    "nav",
    "header",
    "footer",
    ".menu",
    ".sidebar",
    ".comments",
    ".ad",
    ".advertisement",
    ".social-share",
    ".related-posts",
    ".popup",
    ".modal",
    "form",
    "button",
    "input",
    "select",
    "textarea",
    r#"[role="navigation"]"#,
    r#"[role="banner"]"#,
    r#"[role="contentinfo"]"#,
    ".meta",
    ".tags",
    ".categories",
    ".author-bio",
    r#"link[rel="stylesheet"]"#,
    "meta",
];

/// Candidate main-content containers, highest priority first.
pub const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    ".post-content",
    ".article-content",
    ".entry-content",
    ".post-body",
    ".article-body",
    ".content",
    "section",
    "div.content",
    "div.article",
    "div.post",
];

/// Elements followed by a line break in the rendered text.
const BLOCK_TAGS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6", "div", "li"];

static NOISE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(&NOISE_SELECTORS.join(", ")).expect("valid noise selector"));

static CONTENT: Lazy<Vec<(&'static str, Selector)>> = Lazy::new(|| {
    CONTENT_SELECTORS
        .iter()
        .map(|s| (*s, Selector::parse(s).expect("valid content selector")))
        .collect()
});

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid body selector"));

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static ENTITIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)&(?:[a-z0-9]+|#[0-9]+|#x[0-9a-f]+);").expect("valid entity regex"));
static HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").expect("valid space regex"));
static NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\n\s*").expect("valid newline regex"));

/// Extract the main text of a document.
///
/// Returns an empty string only when the document has no text at all.
pub fn extract_content(document: &Html) -> String {
    for (name, selector) in CONTENT.iter() {
        let Some(element) = document.select(selector).find(|el| !in_noise(*el)) else {
            continue;
        };
        let text = normalize_text(&render_text(element));
        let len = text.chars().count();
        if len > MIN_CONTENT_LEN {
            debug!(selector = name, chars = len, "Content selector accepted");
            return text;
        }
        debug!(selector = name, chars = len, "Content selector below threshold");
    }

    let root = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());
    let text = normalize_text(&render_text(root));
    debug!(chars = text.chars().count(), "Falling back to whole body");
    text
}

/// Whether an element is noise or sits inside a noise subtree.
fn in_noise(element: ElementRef<'_>) -> bool {
    NOISE.matches(&element)
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| NOISE.matches(&ancestor))
}

/// Render an element's text, skipping noise, with `<br>` as a newline and a
/// newline after each block element.
pub fn render_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    render_into(element, &mut out);
    out
}

fn render_into(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if NOISE.matches(&child_el) {
                continue;
            }
            let name = child_el.value().name();
            if name == "br" {
                out.push('\n');
                continue;
            }
            render_into(child_el, out);
            if BLOCK_TAGS.contains(&name) {
                out.push('\n');
            }
        }
    }
}

/// Strip leftover markup and entities, collapse whitespace, keep single
/// newlines between blocks.
pub fn normalize_text(raw: &str) -> String {
    let text = TAGS.replace_all(raw, "");
    let text = ENTITIES.replace_all(&text, " ");
    let text = HSPACE.replace_all(&text, " ");
    let text = NEWLINES.replace_all(&text, "\n");
    text.trim().to_string()
}
