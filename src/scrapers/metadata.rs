//! Title, author and image extraction.
//!
//! Each field is resolved by an ordered chain of [`Rule`]s. A rule is a pure
//! lookup against the document; the first rule yielding a non-blank value
//! wins, and a literal default covers the case where every rule misses.
//!
//! The chains are compiled once into [`CompiledRule`]s on first use.

use crate::models::{UNKNOWN_AUTHOR, UNTITLED};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/800x400?text=No+Image+Found";

/// One lookup in a fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// `content` of `<meta property="...">`.
    MetaProperty(&'static str),
    /// `content` of `<meta name="...">`.
    MetaName(&'static str),
    /// Text of the first element matching a selector.
    Text(&'static str),
    /// An attribute of the first element matching a selector.
    Attr(&'static str, &'static str),
}

pub const TITLE_RULES: &[Rule] = &[
    Rule::MetaProperty("og:title"),
    Rule::MetaName("twitter:title"),
    Rule::Text("title"),
    Rule::Text("h1"),
    Rule::Text("h2"),
];

pub const AUTHOR_RULES: &[Rule] = &[
    Rule::MetaName("author"),
    Rule::MetaProperty("article:author"),
    Rule::Text(".author"),
    Rule::Text(".byline"),
    Rule::Text(".author-name"),
];

pub const IMAGE_RULES: &[Rule] = &[
    Rule::MetaProperty("og:image"),
    Rule::MetaName("twitter:image"),
    Rule::MetaProperty("og:image:url"),
    Rule::Attr("article img[src]", "src"),
    Rule::Attr("img[src]", "src"),
];

static TITLE_CHAIN: Lazy<Vec<CompiledRule>> = Lazy::new(|| compile(TITLE_RULES));
static AUTHOR_CHAIN: Lazy<Vec<CompiledRule>> = Lazy::new(|| compile(AUTHOR_RULES));
static IMAGE_CHAIN: Lazy<Vec<CompiledRule>> = Lazy::new(|| compile(IMAGE_RULES));

impl Rule {
    fn css(&self) -> String {
        match *self {
            Rule::MetaProperty(prop) => format!(r#"meta[property="{prop}"]"#),
            Rule::MetaName(name) => format!(r#"meta[name="{name}"]"#),
            Rule::Text(css) | Rule::Attr(css, _) => css.to_string(),
        }
    }

    /// Attribute to read, or `None` for element text.
    fn attr(&self) -> Option<&'static str> {
        match *self {
            Rule::MetaProperty(_) | Rule::MetaName(_) => Some("content"),
            Rule::Attr(_, attr) => Some(attr),
            Rule::Text(_) => None,
        }
    }
}

/// A [`Rule`] with its selector parsed.
#[derive(Debug)]
pub struct CompiledRule {
    selector: Selector,
    attr: Option<&'static str>,
}

impl CompiledRule {
    /// Evaluate against a document. Blank values count as a miss.
    pub fn apply(&self, document: &Html) -> Option<String> {
        let element = document.select(&self.selector).next()?;
        let value = match self.attr {
            Some(attr) => element.value().attr(attr)?.trim().to_string(),
            None => element
                .text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" "),
        };
        (!value.is_empty()).then_some(value)
    }
}

fn compile(rules: &[Rule]) -> Vec<CompiledRule> {
    rules
        .iter()
        .map(|rule| CompiledRule {
            selector: Selector::parse(&rule.css()).expect("valid metadata selector"),
            attr: rule.attr(),
        })
        .collect()
}

/// First rule in `rules` that yields a value.
pub fn first_match(rules: &[CompiledRule], document: &Html) -> Option<String> {
    rules.iter().find_map(|rule| rule.apply(document))
}

/// Extract the article title.
///
/// # Arguments
///
/// * `document` - The parsed page
///
/// # Returns
///
/// The first non-blank value of `og:title`, `twitter:title`, `<title>`,
/// `<h1>`, `<h2>`, with inner whitespace collapsed; [`UNTITLED`] when all miss.
pub fn extract_title(document: &Html) -> String {
    first_match(&TITLE_CHAIN, document).unwrap_or_else(|| UNTITLED.to_string())
}

/// Extract the author name.
///
/// # Arguments
///
/// * `document` - The parsed page
///
/// # Returns
///
/// The first non-blank value of `<meta name="author">`,
/// `article:author`, `.author`, `.byline`, `.author-name`;
/// [`UNKNOWN_AUTHOR`] when all miss.
pub fn extract_author(document: &Html) -> String {
    first_match(&AUTHOR_CHAIN, document).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string())
}

/// Extract the lead image.
///
/// # Arguments
///
/// * `document` - The parsed page
/// * `page_url` - URL the page was fetched from, used to resolve relative paths
///
/// # Returns
///
/// An absolute image URL, or [`PLACEHOLDER_IMAGE`] when nothing is found or
/// the value cannot be resolved.
pub fn extract_image(document: &Html, page_url: &Url) -> String {
    first_match(&IMAGE_CHAIN, document)
        .and_then(|raw| page_url.join(&raw).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string())
}
