//! Book record parsed from a reading-history export

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Graph/URL key prefix for book nodes
pub const BOOK_KEY_PREFIX: &str = "book::";

/// Page counts above this are treated as unknown
pub const MAX_PAGES: u32 = 100_000;

/// Page count if it is positive and plausible
pub fn plausible_pages(pages: u32) -> Option<u32> {
    (1..=MAX_PAGES).contains(&pages).then_some(pages)
}

/// One completed book from the export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Stable identifier: the export's book id, or `"<title>::<author>"`
    pub id: String,
    pub title: String,
    pub author: String,
    /// Page count, if known
    pub pages: Option<u32>,
    /// User rating 1-5; `None` when unrated
    pub rating: Option<u8>,
    /// Date the book was finished
    pub date_read: Option<NaiveDate>,
    /// Original publication year
    pub pub_year: Option<i32>,
    /// Export shelf the row came from
    pub shelf: String,
    /// Cover image, resolved by enrichment
    pub cover_url: Option<String>,
    /// Subjects/genres, resolved by enrichment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
}

impl BookRecord {
    /// Graph node key for this book
    pub fn node_key(&self) -> String {
        format!("{}{}", BOOK_KEY_PREFIX, self.id)
    }

    /// Fallback identifier when the export carries no id column
    pub fn derived_id(title: &str, author: &str) -> String {
        format!("{}::{}", title, author)
    }

    /// Set the cover once; later calls are ignored
    ///
    /// Returns `true` if the cover was set by this call.
    pub fn set_cover(&mut self, url: String) -> bool {
        if self.cover_url.is_some() || url.is_empty() {
            return false;
        }
        self.cover_url = Some(url);
        true
    }
}

#[cfg(test)]
pub(crate) fn sample(id: &str, title: &str, author: &str) -> BookRecord {
    BookRecord {
        id: id.to_string(),
        title: title.to_string(),
        author: author.to_string(),
        pages: None,
        rating: None,
        date_read: None,
        pub_year: None,
        shelf: "read".to_string(),
        cover_url: None,
        subjects: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_set_at_most_once() {
        let mut book = sample("1", "Dune", "Frank Herbert");
        assert!(book.set_cover("https://a/1.jpg".to_string()));
        assert!(!book.set_cover("https://b/2.jpg".to_string()));
        assert_eq!(book.cover_url.as_deref(), Some("https://a/1.jpg"));
    }

    #[test]
    fn test_node_key() {
        let book = sample("42", "Dune", "Frank Herbert");
        assert_eq!(book.node_key(), "book::42");
        assert_eq!(BookRecord::derived_id("Dune", "Frank Herbert"), "Dune::Frank Herbert");
    }
}
