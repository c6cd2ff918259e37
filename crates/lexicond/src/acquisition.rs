//! Word acquisition loop.
//!
//! Turns an unreliable generator into exactly N new, unique entries:
//! 1. Seed the known-terms set from the store
//! 2. Ask the generator for a word, excluding every known term
//! 3. Parse the payload; on failure back off (`error_delay`) and retry
//! 4. Discard known terms as duplicates and pace (`step_delay`)
//! 5. Insert new terms; a key conflict is a duplicate, any other store
//!    failure backs off like a parse failure
//!
//! Retries are unbounded. Callers that need a deadline wrap the loop.

use crate::config::AcquisitionConfig;
use crate::generator::{PromptContext, WordGenerator};
use crate::store::VocabStore;
use lexicon_shared::parser;
use lexicon_shared::{StoreError, VocabularyEntry};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that end an acquisition run
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Target count must be at least 1 (got {0})")]
    InvalidTarget(usize),

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

/// Delays between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// After an accepted or duplicate candidate
    pub step_delay: Duration,
    /// After a generator, parse or store failure
    pub error_delay: Duration,
}

impl Pacing {
    pub fn new(step_delay: Duration, error_delay: Duration) -> Self {
        Self {
            step_delay,
            error_delay,
        }
    }

    /// No waiting at all, for tests and dry runs
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

impl From<&AcquisitionConfig> for Pacing {
    fn from(config: &AcquisitionConfig) -> Self {
        Self::new(config.step_delay(), config.error_delay())
    }
}

/// Per-run counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub requests: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub parse_failures: usize,
    pub generator_failures: usize,
    pub store_failures: usize,
}

impl AcquisitionStats {
    /// Attempts that ended in backoff
    pub fn failures(&self) -> usize {
        self.parse_failures + self.generator_failures + self.store_failures
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct AcquiredBatch {
    /// Accepted entries, in acceptance order
    pub entries: Vec<VocabularyEntry>,
    pub stats: AcquisitionStats,
}

/// Outcome of one generate/parse/insert attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Accepted,
    Duplicate,
    Failed,
}

/// Loop state owned by a single run
struct AcquisitionSession {
    known: HashSet<String>,
    /// Known terms in store order, then acceptance order
    known_order: Vec<String>,
    accepted: Vec<VocabularyEntry>,
    stats: AcquisitionStats,
}

impl AcquisitionSession {
    fn seed(existing: Vec<String>) -> Self {
        let mut session = Self {
            known: HashSet::with_capacity(existing.len()),
            known_order: Vec::with_capacity(existing.len()),
            accepted: Vec::new(),
            stats: AcquisitionStats::default(),
        };
        for term in existing {
            session.remember(term);
        }
        session
    }

    fn is_known(&self, term: &str) -> bool {
        self.known.contains(term)
    }

    fn remember(&mut self, term: String) {
        if self.known.insert(term.clone()) {
            self.known_order.push(term);
        }
    }

    fn accept(&mut self, entry: VocabularyEntry) {
        self.remember(entry.term.clone());
        self.accepted.push(entry);
        self.stats.accepted += 1;
    }

    fn prompt_context(&self) -> PromptContext {
        PromptContext {
            excluded_terms: self.known_order.clone(),
        }
    }
}

/// Drives generator, parser and store until a batch is complete
pub struct AcquisitionLoop {
    generator: Arc<dyn WordGenerator>,
    store: Arc<dyn VocabStore>,
    pacing: Pacing,
}

impl AcquisitionLoop {
    pub fn new(
        generator: Arc<dyn WordGenerator>,
        store: Arc<dyn VocabStore>,
        pacing: Pacing,
    ) -> Self {
        Self {
            generator,
            store,
            pacing,
        }
    }

    /// Acquire exactly `target_count` new entries, in acceptance order
    pub async fn acquire_batch(
        &self,
        target_count: usize,
    ) -> Result<Vec<VocabularyEntry>, AcquisitionError> {
        Ok(self.acquire_batch_with_stats(target_count).await?.entries)
    }

    /// Like `acquire_batch`, also returning the run's counters
    pub async fn acquire_batch_with_stats(
        &self,
        target_count: usize,
    ) -> Result<AcquiredBatch, AcquisitionError> {
        if target_count == 0 {
            return Err(AcquisitionError::InvalidTarget(target_count));
        }

        let existing = self
            .store
            .all_terms()
            .await
            .map_err(AcquisitionError::StoreUnavailable)?;
        let mut session = AcquisitionSession::seed(existing);
        info!(
            "Acquiring {} new words ({} already known)",
            target_count,
            session.known.len()
        );

        while session.accepted.len() < target_count {
            let outcome = self.attempt(&mut session).await;
            if session.accepted.len() >= target_count {
                break;
            }
            let delay = match outcome {
                Attempt::Accepted | Attempt::Duplicate => self.pacing.step_delay,
                Attempt::Failed => self.pacing.error_delay,
            };
            tokio::time::sleep(delay).await;
        }

        info!(
            "Acquired {} words in {} requests ({} duplicates, {} failures)",
            session.accepted.len(),
            session.stats.requests,
            session.stats.duplicates,
            session.stats.failures()
        );

        Ok(AcquiredBatch {
            entries: session.accepted,
            stats: session.stats,
        })
    }

    async fn attempt(&self, session: &mut AcquisitionSession) -> Attempt {
        session.stats.requests += 1;

        let raw = match self.generator.generate(&session.prompt_context()).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Error generating word: {}", e);
                session.stats.generator_failures += 1;
                return Attempt::Failed;
            }
        };

        let candidate = match parser::parse(&raw) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!("Discarding malformed generator response: {}", e);
                debug!("Raw response: {}", raw);
                session.stats.parse_failures += 1;
                return Attempt::Failed;
            }
        };

        if session.is_known(&candidate.term) {
            info!("Word already exists: {}", candidate.term);
            session.stats.duplicates += 1;
            return Attempt::Duplicate;
        }

        let entry = candidate.into_entry();
        match self.store.insert(&entry).await {
            Ok(()) => {
                info!("Saved new word: {}", entry.term);
                session.accept(entry);
                Attempt::Accepted
            }
            Err(StoreError::Duplicate(term)) => {
                info!("Word already exists (stored concurrently): {}", term);
                session.remember(term);
                session.stats.duplicates += 1;
                Attempt::Duplicate
            }
            Err(e) => {
                warn!("Error saving word '{}': {}", entry.term, e);
                session.stats.store_failures += 1;
                Attempt::Failed
            }
        }
    }
}
