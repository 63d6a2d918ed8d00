//! # Article Enhancer
//!
//! Scrapes article pages and blog listings from arbitrary sites, extracts
//! their text and metadata with ordered heuristics, and rewrites stored
//! articles through an OpenAI-compatible LLM using related pages found via
//! search as context.
//!
//! ## Architecture
//!
//! 1. **Fetching** ([`fetcher`]): browser-like GET with retries and timeout escalation
//! 2. **Extraction** ([`scrapers`]): content, metadata and listing links
//! 3. **Ingest** ([`ingest`]): URL → stored [`models::Article`]s
//! 4. **Enhancement** ([`enhancer`]): search → references → LLM under a deadline
//!    → `enhanced` or `error`
//!
//! External services sit behind traits ([`store::ArticleStore`],
//! [`search::SearchProvider`], [`api::Generate`], [`fetcher::Transport`]) so
//! the pipeline can run against fakes.

pub mod api;
pub mod cli;
pub mod config;
pub mod enhancer;
pub mod error;
pub mod fetcher;
pub mod ingest;
pub mod models;
pub mod outputs;
pub mod scrapers;
pub mod search;
pub mod status;
pub mod store;
pub mod utils;

pub use error::{Error, ErrorBody, ErrorKind, Result};
