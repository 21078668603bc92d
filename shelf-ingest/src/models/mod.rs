//! Data models for shelf-ingest

pub mod book;

pub use book::{plausible_pages, BookRecord, BOOK_KEY_PREFIX, MAX_PAGES};
