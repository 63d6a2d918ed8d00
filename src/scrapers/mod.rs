//! Scraping of arbitrary article pages and blog listings.
//!
//! Unlike per-site scrapers, nothing here knows the markup of a particular
//! site. Everything works from ordered heuristics over the parsed document:
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`content`] | Main text: priority-ordered containers with a length threshold |
//! | [`metadata`] | Title, author, image: ordered rule chains with defaults |
//! | [`links`] | Candidate article URLs on a listing page |
//! | [`article`] | Fetch + extract for one URL, and concurrent batches |
//!
//! # Common Patterns
//!
//! - Pure extraction functions take `&scraper::Html` and never mutate it
//! - Network-facing functions are generic over [`crate::fetcher::Transport`]
//! - Failed fetches inside a batch are logged and reported per URL

pub mod article;
pub mod content;
pub mod links;
pub mod metadata;

pub use article::{parse_article, scrape_article, scrape_many, scrape_reference_text};
pub use content::extract_content;
pub use links::{discover_links, extract_article_links};
