//! In-process catalogue sources standing in for the external APIs

use async_trait::async_trait;
use shelf_ingest::enrichment::{BookMetadata, CatalogueBook, MetadataSource, SourceError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Resolves a cover for every title except those marked failing
pub struct FakeSource {
    failing: HashSet<String>,
    calls: AtomicUsize,
    /// `(title, author)` pairs listed by author
    catalogue: Vec<(String, String)>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
            catalogue: Vec::new(),
        }
    }

    pub fn listing(mut self, title: &str, author: &str) -> Self {
        self.catalogue.push((title.to_string(), author.to_string()));
        self
    }

    pub fn failing_on(mut self, title: &str) -> Self {
        self.failing.insert(title.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn cover_for(title: &str) -> String {
        format!("https://covers.test/{}.jpg", title.replace(' ', "_"))
    }
}

#[async_trait]
impl MetadataSource for FakeSource {
    fn source_id(&self) -> &'static str {
        "fake"
    }

    async fn lookup(&self, title: &str, _author: &str) -> Result<BookMetadata, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(title) {
            return Err(SourceError::Network("connection reset".to_string()));
        }
        Ok(BookMetadata {
            cover_url: Some(Self::cover_for(title)),
            subjects: vec!["Fiction Test".to_string()],
            ..Default::default()
        })
    }

    async fn books_by_author(&self, author: &str, limit: usize) -> Result<Vec<CatalogueBook>, SourceError> {
        Ok(self
            .catalogue
            .iter()
            .filter(|(_, listed_author)| listed_author == author)
            .take(limit)
            .map(|(title, author)| CatalogueBook {
                title: title.clone(),
                author: author.clone(),
                cover_url: Some(Self::cover_for(title)),
                pub_year: None,
                subjects: Vec::new(),
                source: "fake",
                external_id: Some(format!("fake:{title}")),
            })
            .collect())
    }
}

/// Like [`FakeSource`], but titles starting with `Slow` never resolve
pub struct StallingSource {
    inner: FakeSource,
}

impl StallingSource {
    pub fn new() -> Self {
        Self {
            inner: FakeSource::new(),
        }
    }
}

#[async_trait]
impl MetadataSource for StallingSource {
    fn source_id(&self) -> &'static str {
        "stalling"
    }

    async fn lookup(&self, title: &str, author: &str) -> Result<BookMetadata, SourceError> {
        if title.starts_with("Slow") {
            std::future::pending::<()>().await;
        }
        self.inner.lookup(title, author).await
    }
}
