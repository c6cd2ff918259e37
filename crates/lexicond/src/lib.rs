//! Lexicon daemon library.
//!
//! Acquires new vocabulary entries from a text generator, keeps them in a
//! SQLite record store and mails a daily digest.

pub mod acquisition;
pub mod config;
pub mod generator;
pub mod mailer;
pub mod pipeline;
pub mod schedule;
pub mod store;
