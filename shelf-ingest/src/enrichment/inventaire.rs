//! Inventaire entity search client
//!
//! Lookups yield covers only. Listings reuse the entity search; subject
//! listings keep only entries whose description names an author.

use super::{
    get_json, http_client, source_limiter, BookMetadata, CatalogueBook, MetadataSource, SourceError,
    SourceLimiter,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const INVENTAIRE_URL: &str = "https://inventaire.io";
const SEARCH_LIMIT: usize = 3;
const LISTING_HEADROOM: usize = 5;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Entity>,
}

#[derive(Debug, Deserialize)]
struct Entity {
    uri: Option<String>,
    label: Option<String>,
    description: Option<String>,
    image: Option<EntityImage>,
}

#[derive(Debug, Deserialize)]
struct EntityImage {
    url: Option<String>,
}

pub struct InventaireClient {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: SourceLimiter,
}

impl InventaireClient {
    pub fn new(requests_per_second: u32, timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: INVENTAIRE_URL.to_string(),
            rate_limiter: source_limiter(requests_per_second),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search(&self, query: String, limit: usize) -> Result<Vec<Entity>, SourceError> {
        let url = format!("{}/api/entities", self.base_url);
        let params = [
            ("action", "search".to_string()),
            ("search", query),
            ("types", "works".to_string()),
            ("lang", "en".to_string()),
            ("limit", limit.to_string()),
        ];
        let response: SearchResponse = get_json(&self.client, &self.rate_limiter, &url, &params).await?;
        Ok(response.results)
    }
}

#[async_trait]
impl MetadataSource for InventaireClient {
    fn source_id(&self) -> &'static str {
        "inventaire"
    }

    async fn lookup(&self, title: &str, author: &str) -> Result<BookMetadata, SourceError> {
        let mut results = self.search(format!("{title} {author}"), SEARCH_LIMIT).await?;
        if results.is_empty() {
            results = self.search(title.to_string(), SEARCH_LIMIT).await?;
        }
        entity_cover(&results, &self.base_url).ok_or(SourceError::NotFound)
    }

    async fn books_by_author(&self, author: &str, limit: usize) -> Result<Vec<CatalogueBook>, SourceError> {
        let results = self.search(author.to_string(), limit + LISTING_HEADROOM).await?;
        Ok(entity_books(results, &self.base_url, Some(author), limit))
    }

    async fn books_by_subject(&self, subject: &str, limit: usize) -> Result<Vec<CatalogueBook>, SourceError> {
        let results = self.search(subject.to_string(), limit + LISTING_HEADROOM).await?;
        Ok(entity_books(results, &self.base_url, None, limit))
    }
}

/// Absolute image URL for an entity; relative paths resolve against `base_url`
fn image_url(entity: &Entity, base_url: &str) -> Option<String> {
    let raw = entity.image.as_ref()?.url.as_deref()?;
    if raw.is_empty() {
        return None;
    }
    Some(if raw.starts_with('/') {
        format!("{base_url}{raw}")
    } else {
        raw.to_string()
    })
}

/// First entity with an image
fn entity_cover(results: &[Entity], base_url: &str) -> Option<BookMetadata> {
    results.iter().find_map(|entity| {
        Some(BookMetadata {
            cover_url: Some(image_url(entity, base_url)?),
            ..Default::default()
        })
    })
}

/// Author named in a description like `"novel by Ursula K. Le Guin"`
fn described_author(description: &str) -> Option<String> {
    let (_, author) = description.split_once(" by ")?;
    let author = author.trim();
    (!author.is_empty()).then(|| author.to_string())
}

/// Labelled entities as catalogue books
///
/// With `author` set every entity is attributed to it; otherwise the author
/// comes from the description and unattributed entities are dropped.
fn entity_books(results: Vec<Entity>, base_url: &str, author: Option<&str>, limit: usize) -> Vec<CatalogueBook> {
    results
        .into_iter()
        .filter_map(|entity| {
            let title = entity.label.as_deref().map(str::trim).filter(|l| !l.is_empty())?.to_string();
            let author = match author {
                Some(author) => author.to_string(),
                None => described_author(entity.description.as_deref()?)?,
            };
            Some(CatalogueBook {
                title,
                author,
                cover_url: image_url(&entity, base_url),
                pub_year: None,
                subjects: Vec::new(),
                source: "inventaire",
                external_id: entity.uri,
            })
        })
        .take(limit)
        .collect()
}
