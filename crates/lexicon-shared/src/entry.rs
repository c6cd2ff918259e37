//! Vocabulary data model.

use serde::{Deserialize, Serialize};

/// A persisted vocabulary entry. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    /// Unique, case-sensitive key
    pub term: String,
    pub definition: String,
    /// Example sentences, in display order
    pub usages: Vec<String>,
}

impl VocabularyEntry {
    pub fn new(term: impl Into<String>, definition: impl Into<String>, usages: Vec<String>) -> Self {
        Self {
            term: term.into(),
            definition: definition.into(),
            usages,
        }
    }

    /// Check the storage schema: every field non-empty, at least one usage.
    /// Returns the name of the first offending field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.term.trim().is_empty() {
            return Err("term");
        }
        if self.definition.trim().is_empty() {
            return Err("definition");
        }
        if self.usages.is_empty() || self.usages.iter().any(|u| u.trim().is_empty()) {
            return Err("usages");
        }
        Ok(())
    }
}

/// A parsed generator result that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationCandidate {
    pub term: String,
    pub definition: String,
    pub usages: Vec<String>,
}

impl GenerationCandidate {
    pub fn into_entry(self) -> VocabularyEntry {
        VocabularyEntry {
            term: self.term,
            definition: self.definition,
            usages: self.usages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(term: &str, definition: &str, usages: &[&str]) -> VocabularyEntry {
        VocabularyEntry::new(term, definition, usages.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_validate_accepts_complete_entry() {
        assert!(entry("candid", "truthful and straightforward", &["a candid answer"])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_validate_names_offending_field() {
        assert_eq!(entry(" ", "x", &["y"]).validate(), Err("term"));
        assert_eq!(entry("x", "", &["y"]).validate(), Err("definition"));
        assert_eq!(entry("x", "y", &[]).validate(), Err("usages"));
        assert_eq!(entry("x", "y", &["ok", " "]).validate(), Err("usages"));
    }

    #[test]
    fn test_candidate_into_entry_keeps_fields() {
        let candidate = GenerationCandidate {
            term: "brisk".to_string(),
            definition: "quick and energetic".to_string(),
            usages: vec!["a brisk walk".to_string(), "brisk trade".to_string()],
        };
        let entry = candidate.clone().into_entry();
        assert_eq!(entry.term, candidate.term);
        assert_eq!(entry.definition, candidate.definition);
        assert_eq!(entry.usages, candidate.usages);
    }
}
