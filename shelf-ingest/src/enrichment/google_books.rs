//! Google Books volumes API client
//!
//! Primary source: cover, genres, page count and publication year in one call.
//! Author and subject listings use the same endpoint with `inauthor:` and
//! `subject:` queries, restricted to English.
//! API documentation: https://developers.google.com/books/docs/v1/using

use super::{
    get_json, http_client, source_limiter, BookMetadata, CatalogueBook, MetadataSource, SourceError,
    SourceLimiter,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const GOOGLE_BOOKS_URL: &str = "https://www.googleapis.com/books/v1/volumes";
const LOOKUP_RESULTS: usize = 3;
/// Extra results requested for listings, since some are filtered out
const LISTING_HEADROOM: usize = 5;
const MAX_GENRES: usize = 8;

/// Category fragments too vague to be useful as genres
const GENERIC_TERMS: [&str; 5] = [
    "general",
    "fiction",
    "nonfiction",
    "juvenile fiction",
    "juvenile nonfiction",
];

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    id: Option<String>,
    #[serde(rename = "volumeInfo", default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
struct VolumeInfo {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    language: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(rename = "imageLinks")]
    image_links: Option<ImageLinks>,
    #[serde(rename = "pageCount")]
    page_count: Option<u32>,
    #[serde(rename = "publishedDate")]
    published_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageLinks {
    thumbnail: Option<String>,
    #[serde(rename = "smallThumbnail")]
    small_thumbnail: Option<String>,
}

pub struct GoogleBooksClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: SourceLimiter,
}

impl GoogleBooksClient {
    pub fn new(
        api_key: Option<String>,
        requests_per_second: u32,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: GOOGLE_BOOKS_URL.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            rate_limiter: source_limiter(requests_per_second),
        })
    }

    /// Point the client at another endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search(&self, query: String) -> Result<Vec<Volume>, SourceError> {
        self.volumes(vec![("q", query), ("maxResults", LOOKUP_RESULTS.to_string())])
            .await
    }

    /// English-language listing query
    async fn listing(&self, query: String, limit: usize, by_relevance: bool) -> Result<Vec<Volume>, SourceError> {
        let mut params = vec![
            ("q", query),
            ("maxResults", (limit + LISTING_HEADROOM).to_string()),
            ("langRestrict", "en".to_string()),
        ];
        if by_relevance {
            params.push(("orderBy", "relevance".to_string()));
        }
        self.volumes(params).await
    }

    async fn volumes(&self, mut params: Vec<(&str, String)>) -> Result<Vec<Volume>, SourceError> {
        if let Some(key) = &self.api_key {
            params.push(("key", key.clone()));
        }
        let response: VolumesResponse =
            get_json(&self.client, &self.rate_limiter, &self.base_url, &params).await?;
        Ok(response.items)
    }
}

#[async_trait]
impl MetadataSource for GoogleBooksClient {
    fn source_id(&self) -> &'static str {
        "google_books"
    }

    async fn lookup(&self, title: &str, author: &str) -> Result<BookMetadata, SourceError> {
        // Exact phrase match first, then a looser query
        let mut items = self
            .search(format!("intitle:\"{title}\" inauthor:\"{author}\""))
            .await?;
        if items.is_empty() {
            items = self.search(format!("intitle:{title} inauthor:{author}")).await?;
        }

        let volume = items.into_iter().next().ok_or(SourceError::NotFound)?;
        Ok(volume_metadata(volume))
    }

    async fn books_by_author(&self, author: &str, limit: usize) -> Result<Vec<CatalogueBook>, SourceError> {
        let items = self
            .listing(format!("inauthor:\"{author}\""), limit, false)
            .await?;
        Ok(catalogue_books(items, Some(author), limit))
    }

    async fn books_by_subject(&self, subject: &str, limit: usize) -> Result<Vec<CatalogueBook>, SourceError> {
        let items = self.listing(format!("subject:{subject}"), limit, true).await?;
        Ok(catalogue_books(items, None, limit))
    }
}

fn volume_cover(links: Option<ImageLinks>) -> Option<String> {
    links
        .and_then(|links| links.thumbnail.or(links.small_thumbnail))
        .map(|url| clean_cover_url(&url))
}

fn volume_metadata(volume: Volume) -> BookMetadata {
    let info = volume.volume_info;
    BookMetadata {
        cover_url: volume_cover(info.image_links),
        subjects: parse_categories(&info.categories),
        pages: info.page_count.filter(|p| *p > 0),
        pub_year: info.published_date.as_deref().and_then(leading_year),
    }
}

/// Titled volumes not explicitly tagged with another language
///
/// With `author` set every volume is attributed to it; otherwise volumes
/// without an author are dropped.
fn catalogue_books(volumes: Vec<Volume>, author: Option<&str>, limit: usize) -> Vec<CatalogueBook> {
    volumes
        .into_iter()
        .filter_map(|volume| {
            let info = volume.volume_info;
            if info.language.as_deref().is_some_and(|lang| lang != "en") {
                return None;
            }
            let title = info.title.filter(|t| !t.trim().is_empty())?;
            let author = match author {
                Some(author) => author.to_string(),
                None => info.authors.into_iter().next()?,
            };
            Some(CatalogueBook {
                title,
                author,
                cover_url: volume_cover(info.image_links),
                pub_year: info.published_date.as_deref().and_then(leading_year),
                subjects: parse_categories(&info.categories),
                source: "google_books",
                external_id: volume.id,
            })
        })
        .take(limit)
        .collect()
}

/// Flatten `"Fiction / Science Fiction / General"` into `["Science Fiction"]`
pub fn parse_categories(raw: &[String]) -> Vec<String> {
    let mut genres: Vec<String> = Vec::new();
    for part in raw.iter().flat_map(|c| c.split('/')).map(str::trim) {
        if part.is_empty() || GENERIC_TERMS.contains(&part.to_lowercase().as_str()) {
            continue;
        }
        if !genres.iter().any(|g| g == part) {
            genres.push(part.to_string());
        }
    }
    genres.truncate(MAX_GENRES);
    genres
}

/// Medium-size https cover without the page-curl effect
pub fn clean_cover_url(url: &str) -> String {
    let mut url = url.replacen("http://", "https://", 1).replace("&edge=curl", "");
    if let Some(pos) = url.find("zoom=") {
        let digit = pos + "zoom=".len();
        if url[digit..].starts_with(|c: char| c.is_ascii_digit()) {
            url.replace_range(digit..digit + 1, "2");
        }
    }
    url
}

/// Year from `"1965"`, `"1965-08"` or `"1965-08-01"`
fn leading_year(date: &str) -> Option<i32> {
    date.get(..4)?.parse::<i32>().ok().filter(|y| *y > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const DUNE_RESPONSE: &str = r#"{
        "kind": "books#volumes",
        "totalItems": 1,
        "items": [{
            "id": "B1hSG45JCX4C",
            "volumeInfo": {
                "title": "Dune",
                "authors": ["Frank Herbert"],
                "publishedDate": "1965-08-01",
                "pageCount": 412,
                "categories": ["Fiction / Science Fiction / General", "Fiction / Classics"],
                "imageLinks": {
                    "smallThumbnail": "http://books.google.com/books/content?id=B1hSG45JCX4C&printsec=frontcover&img=1&zoom=5&edge=curl",
                    "thumbnail": "http://books.google.com/books/content?id=B1hSG45JCX4C&printsec=frontcover&img=1&zoom=1&edge=curl"
                }
            }
        }]
    }"#;

    #[test]
    fn test_volume_metadata_from_response() {
        let response: VolumesResponse = serde_json::from_str(DUNE_RESPONSE).unwrap();
        let meta = volume_metadata(response.items.into_iter().next().unwrap());

        assert_eq!(
            meta.cover_url.as_deref(),
            Some("https://books.google.com/books/content?id=B1hSG45JCX4C&printsec=frontcover&img=1&zoom=2")
        );
        assert_eq!(meta.subjects, vec!["Science Fiction".to_string(), "Classics".to_string()]);
        assert_eq!(meta.pages, Some(412));
        assert_eq!(meta.pub_year, Some(1965));
    }

    #[test]
    fn test_catalogue_books_skip_foreign_and_untitled() {
        let response: VolumesResponse = serde_json::from_str(
            r#"{"items": [
                {"id": "a", "volumeInfo": {"title": "Dawn", "authors": ["Octavia E. Butler"], "language": "en"}},
                {"id": "b", "volumeInfo": {"title": "Aube", "authors": ["Octavia E. Butler"], "language": "fr"}},
                {"id": "c", "volumeInfo": {"authors": ["Octavia E. Butler"]}},
                {"id": "d", "volumeInfo": {"title": "Anonymous Work"}},
                {"id": "e", "volumeInfo": {"title": "Imago", "authors": ["Octavia E. Butler"], "publishedDate": "1989"}}
            ]}"#,
        )
        .unwrap();

        let books = catalogue_books(response.items, None, 10);
        let titles: Vec<&str> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Dawn", "Imago"]);
        assert_eq!(books[1].pub_year, Some(1989));
        assert_eq!(books[0].external_id.as_deref(), Some("a"));
        assert_eq!(books[0].source, "google_books");
    }

    #[test]
    fn test_empty_response_has_no_items() {
        let response: VolumesResponse = serde_json::from_str(r#"{"kind":"books#volumes","totalItems":0}"#).unwrap();
        assert!(response.items.is_empty());
    }

    #[test]
    fn test_parse_categories_filters_generic_and_caps() {
        let raw: Vec<String> = vec![
            "Juvenile Fiction / Fantasy & Magic".into(),
            "Fiction / General".into(),
            "Biography & Autobiography / General".into(),
        ];
        assert_eq!(
            parse_categories(&raw),
            vec!["Fantasy & Magic".to_string(), "Biography & Autobiography".to_string()]
        );

        let many: Vec<String> = (0..12).map(|i| format!("Genre {i}")).collect();
        assert_eq!(parse_categories(&many).len(), MAX_GENRES);
    }

    #[test]
    fn test_clean_cover_url_without_zoom() {
        assert_eq!(clean_cover_url("http://x/y.jpg"), "https://x/y.jpg");
        assert_eq!(clean_cover_url("https://x/y?zoom=a"), "https://x/y?zoom=a");
    }

    fn mock_client(server: &mockito::ServerGuard) -> GoogleBooksClient {
        GoogleBooksClient::new(None, 50, Duration::from_secs(5))
            .unwrap()
            .with_base_url(format!("{}/books/v1/volumes", server.url()))
    }

    #[tokio::test]
    async fn test_lookup_falls_back_to_loose_query() {
        let mut server = mockito::Server::new_async().await;
        let exact = server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::UrlEncoded("q".into(), "intitle:\"Dune\" inauthor:\"Frank Herbert\"".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"kind":"books#volumes","totalItems":0}"#)
            .create_async()
            .await;
        let loose = server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::UrlEncoded("q".into(), "intitle:Dune inauthor:Frank Herbert".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(DUNE_RESPONSE)
            .create_async()
            .await;

        let meta = mock_client(&server).lookup("Dune", "Frank Herbert").await.unwrap();
        assert_eq!(meta.pages, Some(412));
        assert!(meta.cover_url.unwrap().starts_with("https://books.google.com/"));
        exact.assert_async().await;
        loose.assert_async().await;
    }

    #[tokio::test]
    async fn test_lookup_status_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let result = mock_client(&server).lookup("Dune", "Frank Herbert").await;
        assert_eq!(result, Err(SourceError::Api(429)));
    }

    #[tokio::test]
    async fn test_books_by_author_attributes_queried_author() {
        let mut server = mockito::Server::new_async().await;
        let listing = server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "inauthor:\"Frank Herbert\"".into()),
                Matcher::UrlEncoded("maxResults".into(), "7".into()),
                Matcher::UrlEncoded("langRestrict".into(), "en".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"items": [
                    {"id": "x1", "volumeInfo": {"title": "Dune Messiah", "authors": ["Herbert, Frank"]}},
                    {"id": "x2", "volumeInfo": {"title": "Children of Dune"}}
                ]}"#,
            )
            .create_async()
            .await;

        let books = mock_client(&server).books_by_author("Frank Herbert", 2).await.unwrap();
        assert_eq!(books.len(), 2);
        assert!(books.iter().all(|b| b.author == "Frank Herbert"));
        assert_eq!(books[1].external_id.as_deref(), Some("x2"));
        listing.assert_async().await;
    }

    #[test]
    fn test_leading_year() {
        assert_eq!(leading_year("2003"), Some(2003));
        assert_eq!(leading_year("2003-04"), Some(2003));
        assert_eq!(leading_year("n.d."), None);
    }
}
