//! Shared types and pure logic for Lexicon components.
//!
//! Nothing in this crate performs I/O: the daemon owns the adapters.

pub mod digest;
pub mod entry;
pub mod error;
pub mod parser;

pub use entry::{GenerationCandidate, VocabularyEntry};
pub use error::{GeneratorError, MailError, ParseError, StoreError};
