//! Runtime configuration.
//!
//! Settings come from an optional YAML file; secrets can be supplied or
//! overridden through environment variables so they never need to live in
//! the file:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `OPENAI_API_KEY` / `GROQ_API_KEY` | `generation.api_key` |
//! | `GOOGLE_API_KEY` | `search.api_key` |
//! | `GOOGLE_CSE_ID` | `search.cse_id` |
//! | `APP_ENV` | `environment` |
//!
//! ```yaml
//! environment: development
//! listing_limit: 5
//! fetch:
//!   timeout_ms: 30000
//!   max_retries: 2
//! generation:
//!   model: llama-3.3-70b-versatile
//!   deadline_secs: 30
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that enhances article content. \
Focus on improving readability, structure, and engagement while preserving the original meaning and style.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Whether full error text may be shown to callers.
    pub fn exposes_error_details(self) -> bool {
        self != Environment::Production
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    /// How many discovered links of a listing page get scraped.
    pub listing_limit: usize,
    pub fetch: FetchConfig,
    pub search: SearchConfig,
    pub generation: GenerationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            listing_limit: 5,
            fetch: FetchConfig::default(),
            search: SearchConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_ms: u64,
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_redirects: usize,
    /// Timeout used when scraping search references during enhancement.
    pub reference_timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 2,
            retry_delay_ms: 1_000,
            max_redirects: 5,
            reference_timeout_ms: 10_000,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn reference_timeout(&self) -> Duration {
        Duration::from_millis(self.reference_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub cse_id: Option<String>,
    /// Results requested from the search API.
    pub num: u32,
    /// Results kept after filtering for blog/article links.
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/customsearch/v1".to_string(),
            api_key: None,
            cse_id: None,
            num: 5,
            max_results: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Hard wall-clock deadline for one completion call.
    pub deadline_secs: u64,
    pub system_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.groq.com/openai/v1".to_string(),
            api_key: None,
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            deadline_secs: 30,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl GenerationConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    /// The API key, or a `Config` error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::Config("OPENAI_API_KEY is not defined in environment variables".to_string())
            })
    }
}

impl AppConfig {
    /// Load from `path` when given (YAML), otherwise start from defaults;
    /// then apply environment overrides.
    #[instrument(level = "info", skip_all)]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                let parsed = Self::from_yaml(&raw)?;
                info!(config_path = %path.display(), "Loaded configuration");
                parsed
            }
            None => {
                debug!("No config file given; using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.normalize();
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let mut config: Self =
            serde_yaml::from_str(raw).map_err(|e| Error::Config(format!("invalid YAML: {e}")))?;
        config.normalize();
        Ok(config)
    }

    /// Overlay secrets and environment from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").or_else(|| lookup("GROQ_API_KEY")) {
            self.generation.api_key = Some(key);
        }
        if let Some(key) = lookup("GOOGLE_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(cx) = lookup("GOOGLE_CSE_ID") {
            self.search.cse_id = Some(cx);
        }
        if let Some(env) = lookup("APP_ENV") {
            self.environment = match env.to_ascii_lowercase().as_str() {
                "production" | "prod" => Environment::Production,
                _ => Environment::Development,
            };
        }
    }

    fn normalize(&mut self) {
        if self.listing_limit == 0 {
            self.listing_limit = 5;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.listing_limit, 5);
        assert_eq!(config.fetch.timeout(), Duration::from_secs(30));
        assert_eq!(config.fetch.max_retries, 2);
        assert_eq!(config.fetch.max_redirects, 5);
        assert_eq!(config.generation.model, "llama-3.3-70b-versatile");
        assert_eq!(config.generation.deadline(), Duration::from_secs(30));
        assert!((config.generation.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml(
            r#"
environment: production
fetch:
  max_retries: 4
generation:
  model: some-other-model
"#,
        )
        .unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert!(!config.environment.exposes_error_details());
        assert_eq!(config.fetch.max_retries, 4);
        assert_eq!(config.fetch.timeout_ms, 30_000);
        assert_eq!(config.generation.model, "some-other-model");
        assert_eq!(config.generation.max_tokens, 2000);
        assert_eq!(config.listing_limit, 5);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            AppConfig::from_yaml("fetch: [1, 2"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("GROQ_API_KEY", "gsk-test"),
            ("GOOGLE_API_KEY", "g-key"),
            ("GOOGLE_CSE_ID", "cx-1"),
            ("APP_ENV", "production"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.generation.require_api_key().unwrap(), "gsk-test");
        assert_eq!(config.search.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.search.cse_id.as_deref(), Some("cx-1"));
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn test_missing_api_key() {
        let config = GenerationConfig::default();
        assert!(matches!(config.require_api_key(), Err(Error::Config(_))));
    }
}
