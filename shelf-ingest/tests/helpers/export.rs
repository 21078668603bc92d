//! Export and multipart request builders

use axum::body::Body;
use axum::http::{header, Request};

const BOUNDARY: &str = "shelfscope-test-boundary";

const HEADER: [&str; 9] = [
    "Book Id",
    "Title",
    "Author",
    "My Rating",
    "Number of Pages",
    "Year Published",
    "Original Publication Year",
    "Date Read",
    "Exclusive Shelf",
];

/// Builds a Goodreads-style CSV export
pub struct ExportBuilder {
    rows: Vec<[String; 9]>,
}

impl ExportBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// A book on the `read` shelf
    pub fn read(
        self,
        id: &str,
        title: &str,
        author: &str,
        rating: u8,
        pages: u32,
        original_year: i32,
        date_read: &str,
    ) -> Self {
        self.row(id, title, author, rating, pages, original_year, date_read, "read")
    }

    #[allow(clippy::too_many_arguments)]
    pub fn row(
        mut self,
        id: &str,
        title: &str,
        author: &str,
        rating: u8,
        pages: u32,
        original_year: i32,
        date_read: &str,
        shelf: &str,
    ) -> Self {
        self.rows.push([
            id.to_string(),
            title.to_string(),
            author.to_string(),
            rating.to_string(),
            pages.to_string(),
            original_year.to_string(),
            original_year.to_string(),
            date_read.to_string(),
            shelf.to_string(),
        ]);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(HEADER).unwrap();
        for row in &self.rows {
            writer.write_record(row).unwrap();
        }
        writer.into_inner().unwrap()
    }
}

/// POST /upload request carrying `content` in multipart field `field`
pub fn multipart_upload(field: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"goodreads_library_export.csv\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}
