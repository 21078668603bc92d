//! Metadata enrichment from external book catalogues
//!
//! Each catalogue is a [`MetadataSource`]. The [`EnrichmentFetcher`] runs the
//! primary source over every record of a job through a bounded worker pool,
//! then retries records still lacking a cover against the fallback sources in
//! a background task. Lookup failures are per-record and never fail a job.
//!
//! Sources can also list catalogue books by author or subject; the fetcher
//! turns those listings into unread suggestions for a book.

pub mod cache;
pub mod google_books;
pub mod inventaire;
pub mod open_library;

pub use cache::LookupCache;
pub use google_books::GoogleBooksClient;
pub use inventaire::InventaireClient;
pub use open_library::OpenLibraryClient;

use crate::job::Job;
use crate::models::{plausible_pages, BookRecord};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use serde::de::DeserializeOwned;
use shelf_common::config::ShelfConfig;
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lookup failure for a single record against a single source
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("No match found")]
    NotFound,

    #[error("API returned status {0}")]
    Api(u16),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout
        } else if e.is_decode() {
            SourceError::Decode(e.to_string())
        } else {
            SourceError::Network(e.to_string())
        }
    }
}

/// Metadata resolved for one book
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookMetadata {
    pub cover_url: Option<String>,
    pub subjects: Vec<String>,
    pub pages: Option<u32>,
    pub pub_year: Option<i32>,
}

/// A book listed by a catalogue, independent of the reading history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogueBook {
    pub title: String,
    pub author: String,
    pub cover_url: Option<String>,
    pub pub_year: Option<i32>,
    pub subjects: Vec<String>,
    /// Source that listed the book
    pub source: &'static str,
    /// Identifier of the entry in that catalogue
    pub external_id: Option<String>,
}

impl CatalogueBook {
    /// The listing as an unrated, unread record
    pub fn to_record(&self) -> BookRecord {
        BookRecord {
            id: BookRecord::derived_id(&self.title, &self.author),
            title: self.title.clone(),
            author: self.author.clone(),
            pages: None,
            rating: None,
            date_read: None,
            pub_year: self.pub_year,
            shelf: CATALOGUE_SHELF.to_string(),
            cover_url: self.cover_url.clone(),
            subjects: self.subjects.clone(),
        }
    }
}

/// Shelf name given to catalogue listings
pub const CATALOGUE_SHELF: &str = "catalogue";

/// Listings requested per source and query
const LISTING_SIZE: usize = 10;

/// One external catalogue
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Short identifier used in logs and cache keys
    fn source_id(&self) -> &'static str;

    /// Look up a book by (normalized) title and author
    async fn lookup(&self, title: &str, author: &str) -> Result<BookMetadata, SourceError>;

    /// Up to `limit` catalogue books by `author`
    async fn books_by_author(&self, _author: &str, _limit: usize) -> Result<Vec<CatalogueBook>, SourceError> {
        Ok(Vec::new())
    }

    /// Up to `limit` catalogue books filed under `subject`
    async fn books_by_subject(&self, _subject: &str, _limit: usize) -> Result<Vec<CatalogueBook>, SourceError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Copy)]
enum Listing<'a> {
    Author(&'a str),
    Subject(&'a str),
}

impl Listing<'_> {
    fn cache_key(&self) -> (&'static str, &str) {
        match self {
            Listing::Author(author) => ("author", *author),
            Listing::Subject(subject) => ("subject", *subject),
        }
    }
}

pub(crate) type SourceLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub(crate) fn source_limiter(requests_per_second: u32) -> SourceLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rps))
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(concat!("shelfscope/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| SourceError::Network(e.to_string()))
}

/// Rate-limited GET returning decoded JSON
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    limiter: &SourceLimiter,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, SourceError> {
    limiter.until_ready().await;

    let response = client.get(url).query(query).send().await?;
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound);
    }
    if !status.is_success() {
        return Err(SourceError::Api(status.as_u16()));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| SourceError::Decode(e.to_string()))
}

/// Strip series markers and subtitles: `"Dune (Dune, #1): Book One"` -> `"Dune"`
pub fn normalize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut depth = 0usize;
    for c in title.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    let head = out.split(':').next().unwrap_or_default();
    head.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive comparison key for titles
fn title_key(title: &str) -> String {
    normalize_title(title).to_lowercase()
}

/// Fill in what the export left blank
///
/// Pages, publication year and subjects are only taken when absent; the cover
/// is set at most once.
pub fn apply_metadata(book: &mut BookRecord, meta: BookMetadata) {
    if let Some(url) = meta.cover_url {
        book.set_cover(url);
    }
    if book.pages.is_none() {
        book.pages = meta.pages.and_then(plausible_pages);
    }
    if book.pub_year.is_none() {
        book.pub_year = meta.pub_year;
    }
    if book.subjects.is_empty() {
        book.subjects = meta.subjects;
    }
}

/// Runs lookups for a job's records
pub struct EnrichmentFetcher {
    primary: Arc<dyn MetadataSource>,
    fallbacks: Vec<Arc<dyn MetadataSource>>,
    cache: LookupCache,
    listings: LookupCache<Vec<CatalogueBook>>,
    workers: usize,
}

impl EnrichmentFetcher {
    pub fn new(
        primary: Arc<dyn MetadataSource>,
        fallbacks: Vec<Arc<dyn MetadataSource>>,
        workers: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            primary,
            fallbacks,
            cache: LookupCache::new(cache_ttl),
            listings: LookupCache::new(cache_ttl),
            workers: workers.max(1),
        }
    }

    /// Google Books as primary, then OpenLibrary and Inventaire as cover fallbacks
    pub fn from_config(config: &ShelfConfig) -> Result<Self, SourceError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let rps = config.requests_per_second;

        let primary = Arc::new(GoogleBooksClient::new(
            config.google_books_api_key.clone(),
            rps,
            timeout,
        )?);
        let fallbacks: Vec<Arc<dyn MetadataSource>> = vec![
            Arc::new(OpenLibraryClient::new(rps, timeout)?),
            Arc::new(InventaireClient::new(rps, timeout)?),
        ];

        Ok(Self::new(
            primary,
            fallbacks,
            config.fetch_workers,
            Duration::from_secs(config.lookup_cache_ttl_secs),
        ))
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    pub fn listing_cache(&self) -> &LookupCache<Vec<CatalogueBook>> {
        &self.listings
    }

    /// Drop expired entries from both caches
    pub fn purge_expired(&self) -> usize {
        let purged = self.cache.purge_expired() + self.listings.purge_expired();
        if purged > 0 {
            debug!(purged, "Purged expired lookup cache entries");
        }
        purged
    }

    /// Cached lookup against one source
    pub async fn lookup(
        &self,
        source: &dyn MetadataSource,
        title: &str,
        author: &str,
    ) -> Result<BookMetadata, SourceError> {
        let source_id = source.source_id();
        if let Some(hit) = self.cache.get(source_id, title, author) {
            return Ok(hit);
        }

        let meta = source.lookup(&normalize_title(title), author).await?;
        self.cache.insert(source_id, title, author, meta.clone());
        Ok(meta)
    }

    /// Primary pass: one lookup per record, `workers` at a time
    ///
    /// Advances the job's progress after each completed lookup and records
    /// resolved covers as they arrive. Returns the records in input order.
    /// Once the job is cancelled, remaining lookups are skipped.
    pub async fn enrich_all(&self, records: Vec<BookRecord>, job: &Job) -> Vec<BookRecord> {
        self.purge_expired();
        let source = self.primary.as_ref();

        let mut enriched: Vec<(usize, BookRecord)> = stream::iter(records.into_iter().enumerate())
            .map(|(idx, mut book)| async move {
                let outcome = tokio::select! {
                    biased;
                    _ = job.cancel_token().cancelled() => None,
                    result = self.lookup(source, &book.title, &book.author) => Some(result),
                };

                match outcome {
                    None => return (idx, book),
                    Some(Ok(meta)) => {
                        apply_metadata(&mut book, meta);
                        if let Some(url) = &book.cover_url {
                            job.record_cover(&book.id, url);
                        }
                    }
                    Some(Err(e)) => {
                        debug!(
                            job_id = %job.id(),
                            source = source.source_id(),
                            book_id = %book.id,
                            error = %e,
                            "Lookup failed"
                        );
                    }
                }
                job.tracker().advance();
                (idx, book)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        enriched.sort_by_key(|(idx, _)| *idx);
        enriched.into_iter().map(|(_, book)| book).collect()
    }

    /// Background pass over records still lacking a cover
    ///
    /// Returns `None` when there is nothing to do.
    pub fn spawn_cover_fallback(
        self: &Arc<Self>,
        books: &[BookRecord],
        job: Arc<Job>,
    ) -> Option<JoinHandle<()>> {
        if self.fallbacks.is_empty() {
            return None;
        }
        let pending: Vec<(String, String, String)> = books
            .iter()
            .filter(|b| b.cover_url.is_none())
            .map(|b| (b.id.clone(), b.title.clone(), b.author.clone()))
            .collect();
        if pending.is_empty() {
            return None;
        }

        let fetcher = Arc::clone(self);
        Some(tokio::spawn(async move {
            let total = pending.len();
            let resolved = AtomicUsize::new(0);

            stream::iter(pending)
                .for_each_concurrent(fetcher.workers, |(id, title, author)| {
                    let (fetcher, job, resolved) = (&fetcher, &job, &resolved);
                    async move {
                        if let Some(url) = fetcher.fallback_cover(job, &title, &author).await {
                            job.record_cover(&id, &url);
                            resolved.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
                .await;

            if job.is_cancelled() {
                debug!(job_id = %job.id(), "Cover fallback stopped, job superseded");
            } else {
                info!(
                    job_id = %job.id(),
                    resolved = resolved.load(Ordering::Relaxed),
                    pending = total,
                    "Cover fallback complete"
                );
            }
        }))
    }

    /// Catalogue books near `book` that are absent from `read`
    ///
    /// Each source is asked, in order, for books by the same author and then
    /// for books under the first subject. Titles are compared after
    /// normalization and case folding, so already-read editions and
    /// duplicates across sources are dropped. Failing sources are skipped.
    pub async fn unread_suggestions(
        &self,
        book: &BookRecord,
        read: &[BookRecord],
        limit: usize,
    ) -> Vec<CatalogueBook> {
        let mut seen: HashSet<String> = read.iter().map(|b| title_key(&b.title)).collect();
        let mut found = Vec::new();
        if limit == 0 {
            return found;
        }

        let mut listings = vec![Listing::Author(&book.author)];
        if let Some(subject) = book.subjects.first() {
            listings.push(Listing::Subject(subject));
        }

        for source in std::iter::once(&self.primary).chain(&self.fallbacks) {
            for listing in &listings {
                let books = match self.listing(source.as_ref(), *listing).await {
                    Ok(books) => books,
                    Err(e) => {
                        debug!(source = source.source_id(), ?listing, error = %e, "Catalogue listing failed");
                        continue;
                    }
                };
                for candidate in books {
                    if candidate.title.trim().is_empty() || !seen.insert(title_key(&candidate.title)) {
                        continue;
                    }
                    found.push(candidate);
                    if found.len() >= limit {
                        return found;
                    }
                }
            }
        }
        found
    }

    /// Cached catalogue listing; empty listings are not stored
    async fn listing(
        &self,
        source: &dyn MetadataSource,
        listing: Listing<'_>,
    ) -> Result<Vec<CatalogueBook>, SourceError> {
        let source_id = source.source_id();
        let (kind, term) = listing.cache_key();
        if let Some(hit) = self.listings.get(source_id, kind, term) {
            return Ok(hit);
        }

        let books = match listing {
            Listing::Author(author) => source.books_by_author(author, LISTING_SIZE).await?,
            Listing::Subject(subject) => source.books_by_subject(subject, LISTING_SIZE).await?,
        };
        if !books.is_empty() {
            self.listings.insert(source_id, kind, term, books.clone());
        }
        Ok(books)
    }

    async fn fallback_cover(&self, job: &Job, title: &str, author: &str) -> Option<String> {
        for source in &self.fallbacks {
            let outcome = tokio::select! {
                biased;
                _ = job.cancel_token().cancelled() => return None,
                result = self.lookup(source.as_ref(), title, author) => result,
            };
            match outcome {
                Ok(BookMetadata { cover_url: Some(url), .. }) => return Some(url),
                Ok(_) => {}
                Err(SourceError::NotFound) => {}
                Err(e) => warn!(source = source.source_id(), error = %e, "Fallback lookup failed"),
            }
        }
        None
    }
}
