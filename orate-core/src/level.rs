use serde::{Deserialize, Serialize};

/// Requested rewrite aggressiveness, fixed per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingLevel {
    /// Paste the transcript verbatim; the rewrite stage is skipped entirely.
    Raw,
    /// Light-touch cleanup: fillers, punctuation, false starts.
    Clean,
    /// Full editorial rewrite of the same ideas.
    Polish,
}

impl ProcessingLevel {
    /// Single default rewrite model for all rewrite-eligible levels
    /// (simplicity over micro-optimizing per level).
    pub const DEFAULT_REWRITE_MODEL: &'static str = "gemini-2.5-flash-lite";

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingLevel::Raw => "raw",
            ProcessingLevel::Clean => "clean",
            ProcessingLevel::Polish => "polish",
        }
    }

    /// Model used when the caller's preferences don't name one.
    /// Empty for `Raw` — no rewrite call is ever made at that level.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProcessingLevel::Raw => "",
            ProcessingLevel::Clean | ProcessingLevel::Polish => Self::DEFAULT_REWRITE_MODEL,
        }
    }
}

impl std::fmt::Display for ProcessingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProcessingLevel::Polish).unwrap(),
            "\"polish\""
        );
        let level: ProcessingLevel = serde_json::from_str("\"clean\"").unwrap();
        assert_eq!(level, ProcessingLevel::Clean);
    }

    #[test]
    fn raw_has_no_default_model() {
        assert_eq!(ProcessingLevel::Raw.default_model(), "");
        assert_eq!(
            ProcessingLevel::Clean.default_model(),
            ProcessingLevel::DEFAULT_REWRITE_MODEL
        );
    }
}
