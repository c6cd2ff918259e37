//! Acquisition loop tests.
//!
//! Tests verify:
//! - A run returns exactly N entries, none of them previously stored
//! - Duplicates never reach the store and are paced, not counted as failures
//! - Generator, parse and store failures back off and retry
//! - Concurrent writers claiming a term are treated as duplicates
//! - Every request carries the full known-terms list

use lexicon_shared::{GeneratorError, StoreError, VocabularyEntry};
use lexicond::acquisition::{AcquiredBatch, AcquisitionError, AcquisitionLoop, Pacing};
use lexicond::generator::FakeGenerator;
use lexicond::store::{MemoryStore, SqliteStore, VocabStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Guard so a broken script fails the test instead of spinning forever
const RUN_GUARD: Duration = Duration::from_secs(5);

fn terms(entries: &[VocabularyEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.term.as_str()).collect()
}

async fn acquire(
    acquisition: &AcquisitionLoop,
    n: usize,
) -> Result<AcquiredBatch, AcquisitionError> {
    tokio::time::timeout(RUN_GUARD, acquisition.acquire_batch_with_stats(n))
        .await
        .expect("acquisition did not finish")
}

// ============================================================================
// Batch contents
// ============================================================================

#[tokio::test]
async fn test_returns_exactly_n_new_entries() {
    let generator = Arc::new(FakeGenerator::new());
    generator
        .push_term("candid")
        .push_term("frugal")
        .push_term("resilient")
        .push_term("unused");
    let store = Arc::new(MemoryStore::new());
    let acquisition = AcquisitionLoop::new(generator.clone(), store.clone(), Pacing::none());

    let batch = acquire(&acquisition, 3).await.unwrap();

    assert_eq!(terms(&batch.entries), vec!["candid", "frugal", "resilient"]);
    assert_eq!(store.entries(), batch.entries);
    assert_eq!(batch.stats.requests, 3);
    assert_eq!(batch.stats.accepted, 3);
    // Nothing requested past the target
    assert_eq!(generator.remaining(), 1);
}

#[tokio::test]
async fn test_acquire_batch_returns_entries_in_acceptance_order() {
    let generator = Arc::new(FakeGenerator::new());
    generator
        .push_term("plucky")
        .push_term("stale")
        .push_raw("not a word")
        .push_term("plucky")
        .push_term("sturdy");
    let store = Arc::new(MemoryStore::with_terms(&["stale"]));
    let acquisition = AcquisitionLoop::new(generator, store.clone(), Pacing::none());

    let entries = tokio::time::timeout(RUN_GUARD, acquisition.acquire_batch(2))
        .await
        .expect("acquisition did not finish")
        .unwrap();

    assert_eq!(terms(&entries), vec!["plucky", "sturdy"]);
    assert_eq!(entries[1].definition, "meaning of sturdy");
    assert_eq!(store.entries().len(), 3);
}

#[tokio::test]
async fn test_known_terms_are_skipped_without_insert() {
    let generator = Arc::new(FakeGenerator::new());
    generator
        .push_term("old")
        .push_term("older")
        .push_term("old")
        .push_term("fresh");
    let store = Arc::new(MemoryStore::with_terms(&["old", "older"]));
    let acquisition = AcquisitionLoop::new(generator.clone(), store.clone(), Pacing::none());

    let batch = acquire(&acquisition, 1).await.unwrap();

    assert_eq!(terms(&batch.entries), vec!["fresh"]);
    assert_eq!(batch.stats.duplicates, 3);
    assert_eq!(batch.stats.failures(), 0);
    // Only the new term was offered to the store
    assert_eq!(store.insert_attempts(), 1);
}

#[tokio::test]
async fn test_repeat_within_run_is_duplicate() {
    let generator = Arc::new(FakeGenerator::new());
    generator.push_term("brisk").push_term("brisk").push_term("keen");
    let store = Arc::new(MemoryStore::new());
    let acquisition = AcquisitionLoop::new(generator, store.clone(), Pacing::none());

    let batch = acquire(&acquisition, 2).await.unwrap();

    assert_eq!(terms(&batch.entries), vec!["brisk", "keen"]);
    assert_eq!(batch.stats.duplicates, 1);
    assert_eq!(store.insert_attempts(), 2);
}

/// Store holds "ephemeral"; the generator offers it first, then garbage,
/// then five new words.
#[tokio::test]
async fn test_existing_word_offered_first_sqlite() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(&dir.path().join("words.db")).unwrap());
    store
        .insert(&VocabularyEntry::new(
            "ephemeral",
            "lasting a very short time",
            vec!["Fame can be ephemeral.".to_string()],
        ))
        .await
        .unwrap();

    let generator = Arc::new(FakeGenerator::new());
    generator
        .push_term("ephemeral")
        .push_raw("I'm sorry, I can't help with that.");
    for term in ["amiable", "diligent", "lucid", "prudent", "zealous"] {
        generator.push_term(term);
    }
    let acquisition = AcquisitionLoop::new(generator, store.clone(), Pacing::none());

    let batch = acquire(&acquisition, 5).await.unwrap();

    assert_eq!(
        terms(&batch.entries),
        vec!["amiable", "diligent", "lucid", "prudent", "zealous"]
    );
    assert!(!terms(&batch.entries).contains(&"ephemeral"));
    assert_eq!(batch.stats.duplicates, 1);
    assert_eq!(batch.stats.parse_failures, 1);
    assert_eq!(store.count().await.unwrap(), 6);
}

#[tokio::test]
async fn test_batch_terms_are_unique() {
    let generator = Arc::new(FakeGenerator::new());
    for term in ["a", "b", "a", "c", "b", "d", "e"] {
        generator.push_term(term);
    }
    let store = Arc::new(MemoryStore::new());
    let acquisition = AcquisitionLoop::new(generator, store, Pacing::none());

    let batch = acquire(&acquisition, 5).await.unwrap();

    let unique: HashSet<&str> = terms(&batch.entries).into_iter().collect();
    assert_eq!(unique.len(), 5);
    assert_eq!(batch.stats.duplicates, 2);
}

// ============================================================================
// Failures and retries
// ============================================================================

#[tokio::test]
async fn test_generator_and_parse_failures_retry() {
    let generator = Arc::new(FakeGenerator::new());
    generator
        .push_error(GeneratorError::Status {
            status: 503,
            body: "overloaded".to_string(),
        })
        .push_raw("Sure! Here is a word for you.")
        .push_raw(r#"{"term": "", "definition": "x", "usages": ["y"]}"#)
        .push_raw("```json\n{\"term\": \"tenacious\", \"definition\": \"persistent\", \"usages\": [\"a tenacious player\"]}\n```");
    let store = Arc::new(MemoryStore::new());
    let acquisition = AcquisitionLoop::new(generator, store.clone(), Pacing::none());

    let batch = acquire(&acquisition, 1).await.unwrap();

    assert_eq!(terms(&batch.entries), vec!["tenacious"]);
    assert_eq!(batch.stats.generator_failures, 1);
    assert_eq!(batch.stats.parse_failures, 2);
    assert_eq!(batch.stats.requests, 4);
    assert_eq!(store.insert_attempts(), 1);
}

#[tokio::test]
async fn test_store_failure_retries_same_term() {
    let generator = Arc::new(FakeGenerator::new());
    generator.push_term("serene").push_term("serene");
    let store = Arc::new(MemoryStore::new());
    store.fail_next_insert(StoreError::Backend("disk I/O error".to_string()));
    let acquisition = AcquisitionLoop::new(generator, store.clone(), Pacing::none());

    let batch = acquire(&acquisition, 1).await.unwrap();

    // The failed term was never stored, so it is still new on the retry
    assert_eq!(terms(&batch.entries), vec!["serene"]);
    assert_eq!(batch.stats.store_failures, 1);
    assert_eq!(batch.stats.duplicates, 0);
    assert_eq!(store.insert_attempts(), 2);
}

#[tokio::test]
async fn test_concurrent_insert_counts_as_duplicate() {
    let generator = Arc::new(FakeGenerator::new());
    generator
        .push_term("astute")
        .push_term("vivid")
        .push_term("vivid")
        .push_term("humble");
    let store = Arc::new(MemoryStore::new());
    store.race_on("vivid");
    let acquisition = AcquisitionLoop::new(generator.clone(), store.clone(), Pacing::none());

    let batch = acquire(&acquisition, 2).await.unwrap();

    assert_eq!(terms(&batch.entries), vec!["astute", "humble"]);
    assert_eq!(batch.stats.duplicates, 2);
    // The raced term joins the known set and is excluded from later prompts
    let calls = generator.calls();
    assert!(calls[2].excluded_terms.contains(&"vivid".to_string()));
    // The second "vivid" was rejected in memory, without touching the store
    assert_eq!(store.insert_attempts(), 3);
}

#[tokio::test]
async fn test_zero_target_rejected() {
    let acquisition = AcquisitionLoop::new(
        Arc::new(FakeGenerator::new()),
        Arc::new(MemoryStore::new()),
        Pacing::none(),
    );
    let err = acquire(&acquisition, 0).await.unwrap_err();
    assert!(matches!(err, AcquisitionError::InvalidTarget(0)));
}

#[tokio::test]
async fn test_unavailable_store_fails_before_generating() {
    let generator = Arc::new(FakeGenerator::new());
    generator.push_term("calm");
    let store = Arc::new(MemoryStore::new());
    store.set_unavailable(true);
    let acquisition = AcquisitionLoop::new(generator.clone(), store, Pacing::none());

    let err = acquire(&acquisition, 1).await.unwrap_err();

    assert!(matches!(err, AcquisitionError::StoreUnavailable(_)));
    assert!(generator.calls().is_empty());
}

// ============================================================================
// Prompt context
// ============================================================================

#[tokio::test]
async fn test_prompt_excludes_stored_and_accepted_terms() {
    let generator = Arc::new(FakeGenerator::new());
    generator.push_term("gentle").push_term("eager");
    let store = Arc::new(MemoryStore::with_terms(&["ardent", "bland"]));
    let acquisition = AcquisitionLoop::new(generator.clone(), store, Pacing::none());

    acquire(&acquisition, 2).await.unwrap();

    let calls = generator.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].excluded_terms, vec!["ardent", "bland"]);
    assert_eq!(calls[1].excluded_terms, vec!["ardent", "bland", "gentle"]);
}

// ============================================================================
// Pacing
// ============================================================================

/// error (15s) + accept (5s) + duplicate (5s) + final accept (no wait)
#[tokio::test(start_paused = true)]
async fn test_pacing_delays() {
    let generator = Arc::new(FakeGenerator::new());
    generator
        .push_error(GeneratorError::Timeout(30))
        .push_term("noble")
        .push_term("noble")
        .push_term("witty");
    let store = Arc::new(MemoryStore::new());
    let pacing = Pacing::new(Duration::from_secs(5), Duration::from_secs(15));
    let acquisition = AcquisitionLoop::new(generator, store, pacing);

    let start = tokio::time::Instant::now();
    let batch = tokio::time::timeout(
        Duration::from_secs(120),
        acquisition.acquire_batch_with_stats(2),
    )
    .await
    .expect("acquisition did not finish")
    .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(terms(&batch.entries), vec!["noble", "witty"]);
    assert!(elapsed >= Duration::from_secs(25), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(26), "elapsed {:?}", elapsed);
}
