//! OpenLibrary search client
//!
//! Covers come from the search document's `cover_i`, or failing that from the
//! first edition's `covers` list. Subject listings come from the
//! `/subjects/{slug}.json` endpoint.

use super::{
    get_json, http_client, source_limiter, BookMetadata, CatalogueBook, MetadataSource, SourceError,
    SourceLimiter,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const OPEN_LIBRARY_URL: &str = "https://openlibrary.org";
const COVERS_URL: &str = "https://covers.openlibrary.org/b/id";
const SEARCH_LIMIT: &str = "5";
const MAX_SUBJECTS: usize = 8;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    key: Option<String>,
    title: Option<String>,
    cover_i: Option<i64>,
    #[serde(default)]
    edition_key: Vec<String>,
    #[serde(default)]
    subject: Vec<String>,
    first_publish_year: Option<i32>,
    number_of_pages_median: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SubjectResponse {
    #[serde(default)]
    works: Vec<SubjectWork>,
}

#[derive(Debug, Deserialize)]
struct SubjectWork {
    key: Option<String>,
    title: Option<String>,
    cover_id: Option<i64>,
    first_publish_year: Option<i32>,
    #[serde(default)]
    authors: Vec<WorkAuthor>,
}

#[derive(Debug, Deserialize)]
struct WorkAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Edition {
    #[serde(default)]
    covers: Vec<i64>,
}

/// Medium cover image URL for an OpenLibrary cover id
pub fn cover_url(cover_id: i64) -> String {
    format!("{COVERS_URL}/{cover_id}-M.jpg")
}

/// URL slug for a subject: `"Science Fiction"` -> `"science_fiction"`
pub fn subject_slug(subject: &str) -> String {
    let lower = subject.trim().to_lowercase();
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

pub struct OpenLibraryClient {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: SourceLimiter,
}

impl OpenLibraryClient {
    pub fn new(requests_per_second: u32, timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: OPEN_LIBRARY_URL.to_string(),
            rate_limiter: source_limiter(requests_per_second),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn edition_cover(&self, edition_id: &str) -> Result<Option<String>, SourceError> {
        let url = format!("{}/books/{}.json", self.base_url, edition_id);
        let edition: Edition = get_json(&self.client, &self.rate_limiter, &url, &[]).await?;
        Ok(edition.covers.into_iter().find(|id| *id > 0).map(cover_url))
    }
}

#[async_trait]
impl MetadataSource for OpenLibraryClient {
    fn source_id(&self) -> &'static str {
        "open_library"
    }

    async fn lookup(&self, title: &str, author: &str) -> Result<BookMetadata, SourceError> {
        let url = format!("{}/search.json", self.base_url);
        let params = [
            ("title", title.to_string()),
            ("author", author.to_string()),
            ("limit", SEARCH_LIMIT.to_string()),
        ];
        let response: SearchResponse = get_json(&self.client, &self.rate_limiter, &url, &params).await?;

        let mut meta = search_metadata(&response.docs).ok_or(SourceError::NotFound)?;
        if meta.cover_url.is_some() {
            return Ok(meta);
        }

        for doc in &response.docs {
            let Some(edition_id) = doc.edition_key.first() else {
                continue;
            };
            match self.edition_cover(edition_id).await {
                Ok(Some(url)) => {
                    meta.cover_url = Some(url);
                    break;
                }
                Ok(None) => {}
                Err(e) => debug!(edition = %edition_id, error = %e, "Edition lookup failed"),
            }
        }
        Ok(meta)
    }

    async fn books_by_author(&self, author: &str, limit: usize) -> Result<Vec<CatalogueBook>, SourceError> {
        let url = format!("{}/search.json", self.base_url);
        let params = [("author", author.to_string()), ("limit", limit.to_string())];
        let response: SearchResponse = get_json(&self.client, &self.rate_limiter, &url, &params).await?;

        Ok(response
            .docs
            .into_iter()
            .filter_map(|doc| {
                let title = doc.title.filter(|t| !t.trim().is_empty())?;
                Some(CatalogueBook {
                    title,
                    author: author.to_string(),
                    cover_url: doc.cover_i.filter(|id| *id > 0).map(cover_url),
                    pub_year: doc.first_publish_year,
                    subjects: doc.subject.into_iter().take(MAX_SUBJECTS).collect(),
                    source: "open_library",
                    external_id: doc.key,
                })
            })
            .take(limit)
            .collect())
    }

    async fn books_by_subject(&self, subject: &str, limit: usize) -> Result<Vec<CatalogueBook>, SourceError> {
        let slug = subject_slug(subject);
        if slug.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/subjects/{}.json", self.base_url, slug);
        let params = [("limit", limit.to_string())];
        let response: SubjectResponse = get_json(&self.client, &self.rate_limiter, &url, &params).await?;
        Ok(subject_books(response.works, subject, limit))
    }
}

/// Works carrying both a title and a named author
fn subject_books(works: Vec<SubjectWork>, subject: &str, limit: usize) -> Vec<CatalogueBook> {
    works
        .into_iter()
        .filter_map(|work| {
            let title = work.title.filter(|t| !t.trim().is_empty())?;
            let author = work.authors.into_iter().find_map(|a| a.name.filter(|n| !n.is_empty()))?;
            Some(CatalogueBook {
                title,
                author,
                cover_url: work.cover_id.filter(|id| *id > 0).map(cover_url),
                pub_year: work.first_publish_year,
                subjects: vec![subject.to_string()],
                source: "open_library",
                external_id: work.key,
            })
        })
        .take(limit)
        .collect()
}

/// Metadata from the best search document; cover only when a doc carries `cover_i`
fn search_metadata(docs: &[SearchDoc]) -> Option<BookMetadata> {
    let best = docs.first()?;
    Some(BookMetadata {
        cover_url: docs.iter().find_map(|d| d.cover_i).filter(|id| *id > 0).map(cover_url),
        subjects: best.subject.iter().take(MAX_SUBJECTS).cloned().collect(),
        pages: best.number_of_pages_median.filter(|p| *p > 0),
        pub_year: best.first_publish_year,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const SEARCH_RESPONSE: &str = r#"{
        "numFound": 2,
        "docs": [
            {
                "key": "/works/OL45883W",
                "title": "The Left Hand of Darkness",
                "edition_key": ["OL24382006M"],
                "first_publish_year": 1969,
                "number_of_pages_median": 304,
                "subject": ["Science fiction", "Gender identity", "Fiction", "Androgyny",
                            "Interplanetary voyages", "Diplomats", "Ekumen", "Gethen", "Winter", "Ice"]
            },
            {
                "key": "/works/OL45884W",
                "cover_i": 8231996,
                "edition_key": ["OL7590364M"]
            }
        ]
    }"#;

    #[test]
    fn test_search_metadata() {
        let response: SearchResponse = serde_json::from_str(SEARCH_RESPONSE).unwrap();
        let meta = search_metadata(&response.docs).unwrap();

        assert_eq!(meta.cover_url.as_deref(), Some("https://covers.openlibrary.org/b/id/8231996-M.jpg"));
        assert_eq!(meta.subjects.len(), MAX_SUBJECTS);
        assert_eq!(meta.subjects[0], "Science fiction");
        assert_eq!(meta.pub_year, Some(1969));
        assert_eq!(meta.pages, Some(304));
    }

    #[test]
    fn test_no_docs_is_none() {
        let response: SearchResponse = serde_json::from_str(r#"{"numFound":0,"docs":[]}"#).unwrap();
        assert!(search_metadata(&response.docs).is_none());
    }

    #[test]
    fn test_edition_covers_decode() {
        let edition: Edition = serde_json::from_str(r#"{"title":"x","covers":[-1, 5521]}"#).unwrap();
        let first = edition.covers.into_iter().find(|id| *id > 0).map(cover_url);
        assert_eq!(first.as_deref(), Some("https://covers.openlibrary.org/b/id/5521-M.jpg"));
    }

    #[test]
    fn test_subject_slug() {
        assert_eq!(subject_slug("Science Fiction"), "science_fiction");
        assert_eq!(subject_slug("  Fantasy & Magic!  "), "fantasy_magic");
        assert_eq!(subject_slug("--"), "");
    }

    fn mock_client(server: &mockito::ServerGuard) -> OpenLibraryClient {
        OpenLibraryClient::new(50, Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.url())
    }

    #[tokio::test]
    async fn test_lookup_reads_edition_cover_when_search_has_none() {
        let mut server = mockito::Server::new_async().await;
        let search = server
            .mock("GET", "/search.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("title".into(), "Kindred".into()),
                Matcher::UrlEncoded("author".into(), "Octavia E. Butler".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"docs": [{"key": "/works/OL1W", "title": "Kindred", "edition_key": ["OL9M"], "first_publish_year": 1979}]}"#)
            .create_async()
            .await;
        let edition = server
            .mock("GET", "/books/OL9M.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"covers": [777]}"#)
            .create_async()
            .await;

        let meta = mock_client(&server).lookup("Kindred", "Octavia E. Butler").await.unwrap();
        assert_eq!(meta.cover_url.as_deref(), Some("https://covers.openlibrary.org/b/id/777-M.jpg"));
        assert_eq!(meta.pub_year, Some(1979));
        search.assert_async().await;
        edition.assert_async().await;
    }

    #[tokio::test]
    async fn test_books_by_subject_uses_slug_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let subject = server
            .mock("GET", "/subjects/science_fiction.json")
            .match_query(Matcher::UrlEncoded("limit".into(), "3".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"name": "science fiction", "works": [
                    {"key": "/works/OL2W", "title": "Dawn", "cover_id": 12, "authors": [{"name": "Octavia E. Butler"}]},
                    {"key": "/works/OL3W", "title": "Anonymous", "authors": []},
                    {"key": "/works/OL4W", "title": "Solaris", "authors": [{"name": "Stanisław Lem"}], "first_publish_year": 1961}
                ]}"#,
            )
            .create_async()
            .await;

        let books = mock_client(&server).books_by_subject("Science Fiction", 3).await.unwrap();
        let titles: Vec<&str> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Dawn", "Solaris"]);
        assert_eq!(books[0].cover_url.as_deref(), Some("https://covers.openlibrary.org/b/id/12-M.jpg"));
        assert_eq!(books[1].author, "Stanisław Lem");
        assert_eq!(books[1].external_id.as_deref(), Some("/works/OL4W"));
        subject.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_subject_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/subjects/nothing_here.json")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let result = mock_client(&server).books_by_subject("Nothing Here", 3).await;
        assert_eq!(result, Err(SourceError::NotFound));
    }
}
