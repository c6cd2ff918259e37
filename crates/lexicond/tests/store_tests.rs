//! SQLite record store tests.
//!
//! Tests verify:
//! - Uniqueness holds across independent handles on one database file
//! - Stored entries survive a reopen with every field intact

use lexicon_shared::{StoreError, VocabularyEntry};
use lexicond::store::{SqliteStore, VocabStore};
use tempfile::tempdir;

fn entry(term: &str, definition: &str) -> VocabularyEntry {
    VocabularyEntry::new(
        term,
        definition,
        vec![format!("{} in a sentence", term), format!("another {}", term)],
    )
}

#[tokio::test]
async fn test_concurrent_writers_single_winner() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("words.db");
    let first = SqliteStore::open(&path).unwrap();
    let second = SqliteStore::open(&path).unwrap();

    let first_entry = entry("gregarious", "fond of company");
    let second_entry = entry("gregarious", "sociable");
    let (a, b) = tokio::join!(first.insert(&first_entry), second.insert(&second_entry));

    let results = [a, b];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(StoreError::Duplicate(t)) if t == "gregarious"))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(duplicates, 1);
    assert_eq!(first.count().await.unwrap(), 1);
    assert_eq!(second.all_terms().await.unwrap(), vec!["gregarious"]);
}

#[tokio::test]
async fn test_losing_writer_leaves_row_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("words.db");
    let first = SqliteStore::open(&path).unwrap();
    let second = SqliteStore::open(&path).unwrap();

    first.insert(&entry("placid", "calm and peaceful")).await.unwrap();
    let err = second
        .insert(&entry("placid", "something else"))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());

    let stored = first.get("placid").await.unwrap().unwrap();
    assert_eq!(stored.definition, "calm and peaceful");
}

#[tokio::test]
async fn test_entries_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("words.db");
    let original = entry("wistful", "having a feeling of vague longing");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.insert(&original).await.unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
    }

    let reopened = SqliteStore::open(&path).unwrap();
    assert!(reopened.contains("wistful").await.unwrap());
    assert!(!reopened.contains("Wistful").await.unwrap());
    assert_eq!(reopened.get("wistful").await.unwrap(), Some(original));
}
