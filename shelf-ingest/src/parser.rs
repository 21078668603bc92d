//! Reading-history export parser
//!
//! Turns a Goodreads-style CSV export into ordered [`BookRecord`]s. Only rows
//! on the `read` exclusive shelf are kept. Any structural problem fails the
//! whole file; there is no per-row recovery.

use crate::models::{plausible_pages, BookRecord};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

pub const COL_BOOK_ID: &str = "Book Id";
pub const COL_TITLE: &str = "Title";
pub const COL_AUTHOR: &str = "Author";
pub const COL_RATING: &str = "My Rating";
pub const COL_PAGES: &str = "Number of Pages";
pub const COL_ORIGINAL_YEAR: &str = "Original Publication Year";
pub const COL_YEAR_PUBLISHED: &str = "Year Published";
pub const COL_DATE_READ: &str = "Date Read";
pub const COL_SHELF: &str = "Exclusive Shelf";

const REQUIRED_COLUMNS: [&str; 6] = [
    COL_TITLE,
    COL_AUTHOR,
    COL_RATING,
    COL_PAGES,
    COL_DATE_READ,
    COL_SHELF,
];

/// Shelf value marking a completed book
pub const READ_SHELF: &str = "read";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Export parsing errors (all fatal to the upload)
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("export is empty")]
    Empty,

    #[error("export is missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("malformed export at line {line}: {message}")]
    Malformed { line: u64, message: String },
}

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        ParseError::Malformed {
            line,
            message: err.to_string(),
        }
    }
}

/// Result of parsing one export file
#[derive(Debug, Clone)]
pub struct ParsedExport {
    /// Completed books in source order
    pub books: Vec<BookRecord>,
    /// Data rows in the file
    pub rows_read: usize,
    /// Rows dropped (other shelves, missing title/author, duplicate ids)
    pub rows_skipped: usize,
}

/// Column positions resolved from the header row
struct Columns {
    book_id: Option<usize>,
    title: usize,
    author: usize,
    rating: usize,
    pages: usize,
    original_year: Option<usize>,
    year_published: Option<usize>,
    date_read: usize,
    shelf: usize,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, ParseError> {
        let index: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim(), i))
            .collect();

        let mut missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| !index.contains_key(*name))
            .map(|name| name.to_string())
            .collect();

        let original_year = index.get(COL_ORIGINAL_YEAR).copied();
        let year_published = index.get(COL_YEAR_PUBLISHED).copied();
        if original_year.is_none() && year_published.is_none() {
            missing.push(format!("{} or {}", COL_ORIGINAL_YEAR, COL_YEAR_PUBLISHED));
        }

        if !missing.is_empty() {
            return Err(ParseError::MissingColumns(missing));
        }

        // Presence checked above
        let col = |name: &str| index.get(name).copied().unwrap_or_default();

        Ok(Self {
            book_id: index.get(COL_BOOK_ID).copied(),
            title: col(COL_TITLE),
            author: col(COL_AUTHOR),
            rating: col(COL_RATING),
            pages: col(COL_PAGES),
            original_year,
            year_published,
            date_read: col(COL_DATE_READ),
            shelf: col(COL_SHELF),
        })
    }
}

/// Parse a raw export into completed book records
pub fn parse_export(bytes: &[u8]) -> Result<ParsedExport, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::Empty);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let columns = Columns::resolve(reader.headers()?)?;

    let mut books = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut rows_read = 0;
    let mut rows_skipped = 0;

    for row in reader.records() {
        let row = row?;
        rows_read += 1;

        let field = |i: usize| row.get(i).map(str::trim).unwrap_or("");

        if !field(columns.shelf).eq_ignore_ascii_case(READ_SHELF) {
            rows_skipped += 1;
            continue;
        }

        let title = field(columns.title);
        let author = field(columns.author);
        if title.is_empty() || author.is_empty() {
            debug!(line = rows_read + 1, "Skipping row without title or author");
            rows_skipped += 1;
            continue;
        }

        let id = columns
            .book_id
            .map(field)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| BookRecord::derived_id(title, author));

        if !seen_ids.insert(id.clone()) {
            warn!(book_id = %id, title = %title, "Duplicate book in export, keeping first occurrence");
            rows_skipped += 1;
            continue;
        }

        let pub_year = columns
            .original_year
            .and_then(|i| parse_year(field(i)))
            .or_else(|| columns.year_published.and_then(|i| parse_year(field(i))));

        books.push(BookRecord {
            id,
            title: title.to_string(),
            author: author.to_string(),
            pages: parse_pages(field(columns.pages)),
            rating: parse_rating(field(columns.rating)),
            date_read: parse_date(field(columns.date_read)),
            pub_year,
            shelf: READ_SHELF.to_string(),
            cover_url: None,
            subjects: Vec::new(),
        });
    }

    debug!(
        rows_read,
        rows_skipped,
        books = books.len(),
        "Export parsed"
    );

    Ok(ParsedExport {
        books,
        rows_read,
        rows_skipped,
    })
}

/// Parse `YYYY/MM/DD` or `YYYY-MM-DD`; anything else is treated as absent
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Ratings are 1-5; 0 means unrated
fn parse_rating(raw: &str) -> Option<u8> {
    raw.parse::<u8>().ok().filter(|r| (1..=5).contains(r))
}

fn parse_pages(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().and_then(plausible_pages)
}

fn parse_year(raw: &str) -> Option<i32> {
    raw.parse::<i32>().ok().filter(|y| *y > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Book Id,Title,Author,My Rating,Number of Pages,Year Published,Original Publication Year,Date Read,Exclusive Shelf";

    fn export(rows: &[&str]) -> String {
        let mut csv = String::from(HEADER);
        for row in rows {
            csv.push('\n');
            csv.push_str(row);
        }
        csv
    }

    #[test]
    fn test_parses_read_rows_in_order() {
        let csv = export(&[
            "1,Dune,Frank Herbert,5,612,2005,1965,2020/03/15,read",
            "2,Emma,Jane Austen,0,,2003,1815,,read",
            "3,Ulysses,James Joyce,0,730,1990,1922,,to-read",
        ]);
        let parsed = parse_export(csv.as_bytes()).unwrap();

        assert_eq!(parsed.rows_read, 3);
        assert_eq!(parsed.rows_skipped, 1);
        assert_eq!(parsed.books.len(), 2);

        let dune = &parsed.books[0];
        assert_eq!(dune.id, "1");
        assert_eq!(dune.rating, Some(5));
        assert_eq!(dune.pages, Some(612));
        assert_eq!(dune.pub_year, Some(1965));
        assert_eq!(dune.date_read, NaiveDate::from_ymd_opt(2020, 3, 15));

        let emma = &parsed.books[1];
        assert_eq!(emma.rating, None);
        assert_eq!(emma.pages, None);
        assert_eq!(emma.date_read, None);
    }

    #[test]
    fn test_missing_columns_rejected() {
        let csv = "Title,Author\nDune,Frank Herbert\n";
        match parse_export(csv.as_bytes()) {
            Err(ParseError::MissingColumns(missing)) => {
                assert!(missing.contains(&COL_DATE_READ.to_string()));
                assert!(missing.contains(&COL_SHELF.to_string()));
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_file_rejected() {
        assert_eq!(parse_export(b"").unwrap_err(), ParseError::Empty);
        assert_eq!(parse_export(b"  \n").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn test_ragged_row_is_fatal() {
        let csv = export(&[
            "1,Dune,Frank Herbert,5,612,2005,1965,2020/03/15,read",
            "2,Emma,Jane Austen",
        ]);
        assert!(matches!(
            parse_export(csv.as_bytes()),
            Err(ParseError::Malformed { .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let csv = export(&[
            "1,Dune,Frank Herbert,5,612,2005,1965,2020/03/15,read",
            "1,Dune,Frank Herbert,4,612,2005,1965,2021/03/15,read",
        ]);
        let parsed = parse_export(csv.as_bytes()).unwrap();
        assert_eq!(parsed.books.len(), 1);
        assert_eq!(parsed.books[0].rating, Some(5));
    }

    #[test]
    fn test_derived_id_without_id_column() {
        let csv = "Title,Author,My Rating,Number of Pages,Year Published,Date Read,Exclusive Shelf\n\
                   Dune,Frank Herbert,4,612,1965,2020-01-02,read\n";
        let parsed = parse_export(csv.as_bytes()).unwrap();
        assert_eq!(parsed.books[0].id, "Dune::Frank Herbert");
        assert_eq!(parsed.books[0].pub_year, Some(1965));
        assert_eq!(parsed.books[0].date_read, NaiveDate::from_ymd_opt(2020, 1, 2));
    }

    #[test]
    fn test_bom_and_quoted_fields() {
        let csv = format!(
            "\u{feff}{}\n7,\"Dune (Dune, #1)\",Frank Herbert,3,612,2005,,2020/03/15,read",
            HEADER
        );
        let parsed = parse_export(csv.as_bytes()).unwrap();
        assert_eq!(parsed.books[0].title, "Dune (Dune, #1)");
        // Falls back to Year Published when the original year is blank
        assert_eq!(parsed.books[0].pub_year, Some(2005));
    }

    #[test]
    fn test_implausible_page_counts_are_absent() {
        let csv = export(&[
            "1,Dune,Frank Herbert,5,4294967295,2005,1965,2020/03/15,read",
            "2,Emma,Jane Austen,4,100001,2003,1815,2020/04/15,read",
            "3,Ulysses,James Joyce,3,100000,1990,1922,2020/05/15,read",
        ]);
        let parsed = parse_export(csv.as_bytes()).unwrap();
        let pages: Vec<Option<u32>> = parsed.books.iter().map(|b| b.pages).collect();
        assert_eq!(pages, vec![None, None, Some(100_000)]);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2021/12/01"), NaiveDate::from_ymd_opt(2021, 12, 1));
        assert_eq!(parse_date("2021-12-01"), NaiveDate::from_ymd_opt(2021, 12, 1));
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date(""), None);
    }
}
