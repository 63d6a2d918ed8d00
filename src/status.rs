//! Per-article enhancement lifecycle.
//!
//! ```text
//! pending ──▶ processing ──▶ enhanced
//!    ▲            │
//!    │            └────────▶ error
//!    └── (caller re-runs from pending / error / enhanced)
//! ```
//!
//! A run is one-shot: it enters `processing` when it starts and leaves it
//! exactly once, to `enhanced` or `error`. Nothing here retries.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Pending,
    Processing,
    Enhanced,
    Error,
}

impl ArticleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ArticleStatus::Pending => "pending",
            ArticleStatus::Processing => "processing",
            ArticleStatus::Enhanced => "enhanced",
            ArticleStatus::Error => "error",
        }
    }

    pub fn can_transition_to(self, next: ArticleStatus) -> bool {
        use ArticleStatus::*;
        matches!(
            (self, next),
            (Pending | Enhanced | Error, Processing) | (Processing, Enhanced | Error)
        )
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::ArticleStatus::*;
    use super::*;

    #[test]
    fn test_default_is_pending() {
        assert_eq!(ArticleStatus::default(), Pending);
    }

    #[test]
    fn test_run_transitions() {
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Enhanced));
        assert!(Processing.can_transition_to(Error));
        // re-runs are a caller decision
        assert!(Error.can_transition_to(Processing));
        assert!(Enhanced.can_transition_to(Processing));
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!Pending.can_transition_to(Enhanced));
        assert!(!Pending.can_transition_to(Error));
        assert!(!Processing.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Enhanced.can_transition_to(Error));
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Enhanced).unwrap(), "\"enhanced\"");
        let s: ArticleStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(s, Processing);
    }
}
