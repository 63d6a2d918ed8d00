//! Command-line interface definitions for the article enhancer.
//!
//! This module defines the CLI arguments and subcommands using the `clap` crate.
//! Secrets (API keys) are read from the environment by [`crate::config`], not
//! from flags.

use clap::{Parser, Subcommand};

/// Command-line arguments for the article enhancer.
///
/// # Examples
///
/// ```sh
/// # Scrape one article, or up to five posts of a blog listing
/// article_enhancer scrape https://example.com/blog
///
/// # Scrape, then enhance every stored article and keep a JSON copy
/// OPENAI_API_KEY=... article_enhancer -j ./json enhance https://example.com/blog/post
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, env = "ARTICLE_ENHANCER_CONFIG")]
    pub config: Option<String>,

    /// Output directory for JSON result files
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Scrape an article page or blog listing and print the stored articles
    Scrape { url: String },

    /// Scrape several article URLs concurrently and print per-URL results
    Batch {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Print the article links discovered on a listing page
    Links { url: String },

    /// Scrape a URL, then enhance every resulting article
    Enhance {
        url: String,

        /// Restart articles left in `processing` by an interrupted run
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "article_enhancer",
            "--json-output-dir",
            "./json",
            "scrape",
            "https://example.com/blog",
        ]);

        assert_eq!(cli.json_output_dir.as_deref(), Some("./json"));
        assert_eq!(
            cli.command,
            Command::Scrape {
                url: "https://example.com/blog".into()
            }
        );
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "article_enhancer",
            "-c",
            "/etc/enhancer.yaml",
            "-j",
            "/tmp/json",
            "enhance",
            "--force",
            "https://example.com/blog/post",
        ]);

        assert_eq!(cli.config.as_deref(), Some("/etc/enhancer.yaml"));
        assert_eq!(cli.json_output_dir.as_deref(), Some("/tmp/json"));
        assert_eq!(
            cli.command,
            Command::Enhance {
                url: "https://example.com/blog/post".into(),
                force: true
            }
        );
    }

    #[test]
    fn test_batch_requires_urls() {
        assert!(Cli::try_parse_from(["article_enhancer", "batch"]).is_err());
        let cli = Cli::try_parse_from(["article_enhancer", "batch", "https://a.example/1", "https://b.example/2"]).unwrap();
        assert!(matches!(cli.command, Command::Batch { urls } if urls.len() == 2));
    }
}
