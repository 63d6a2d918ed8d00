//! Output generation.
//!
//! - [`json`]: Writes scraped or enhanced articles to dated JSON files

pub mod json;
