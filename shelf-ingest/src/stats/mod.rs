//! Reading statistics
//!
//! [`aggregate`] is a pure function of the enriched records and today's date.
//! It produces an `overall` view over every record and a `this_year` view over
//! records finished in the current calendar year.

pub mod cadence;
pub mod histogram;
pub mod series;

pub use cadence::{compute_cadence, Cadence};
pub use histogram::{length_histogram, LengthBucket};
pub use series::{Granularity, ScatterPoint};

use crate::models::BookRecord;
use cadence::round_to;
use chrono::{Datelike, NaiveDate};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

/// The longest book in a view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongestBook {
    pub title: String,
    pub author: String,
    pub pages: u32,
}

/// Statistics for one view (all records, or this year's)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStats {
    pub total_books: usize,
    pub total_pages: u64,
    pub avg_rating: f64,
    pub top_author: Option<String>,
    pub cadence: Cadence,
    pub book_lengths: Vec<LengthBucket>,
    pub longest_book: Option<LongestBook>,
    /// Per-year (overall) or per-month (this year) completion counts
    #[serde(skip_serializing)]
    pub completions: BTreeMap<i32, usize>,
    #[serde(skip_serializing)]
    pub scatter: Vec<ScatterPoint>,
}

/// Result of aggregation, serialized in the upload response shape
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub overall: PeriodStats,
    pub this_year: PeriodStats,
    pub oldest_pub_year: Option<i32>,
}

impl Serialize for StatsSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("StatsSnapshot", 8)?;
        s.serialize_field("overall", &self.overall)?;
        s.serialize_field("this_year", &self.this_year)?;
        s.serialize_field("yearly_books", &self.overall.completions)?;
        s.serialize_field("monthly_books", &self.this_year.completions)?;
        s.serialize_field("scatter_publication_vs_read_all", &self.overall.scatter)?;
        s.serialize_field("scatter_publication_vs_read_year", &self.this_year.scatter)?;
        s.serialize_field("book_lengths", &self.overall.book_lengths)?;
        s.serialize_field("oldest_pub_year", &self.oldest_pub_year)?;
        s.end()
    }
}

/// Compute both views over `records`
pub fn aggregate(records: &[BookRecord], today: NaiveDate) -> StatsSnapshot {
    let current_year = today.year();
    let this_year: Vec<&BookRecord> = records
        .iter()
        .filter(|b| b.date_read.is_some_and(|d| d.year() == current_year))
        .collect();

    StatsSnapshot {
        overall: period_stats(records.iter(), Granularity::Year),
        this_year: period_stats(this_year.iter().copied(), Granularity::Month),
        oldest_pub_year: records.iter().filter_map(|b| b.pub_year).min(),
    }
}

fn period_stats<'a, I>(books: I, granularity: Granularity) -> PeriodStats
where
    I: Iterator<Item = &'a BookRecord> + Clone,
{
    let total_books = books.clone().count();
    let total_pages = books.clone().filter_map(|b| b.pages).map(u64::from).sum();

    let ratings: Vec<u8> = books.clone().filter_map(|b| b.rating).collect();
    let avg_rating = if ratings.is_empty() {
        0.0
    } else {
        let sum: u32 = ratings.iter().map(|r| u32::from(*r)).sum();
        round_to(f64::from(sum) / ratings.len() as f64, 2)
    };

    let dates: Vec<NaiveDate> = books.clone().filter_map(|b| b.date_read).collect();

    PeriodStats {
        total_books,
        total_pages,
        avg_rating,
        top_author: top_author(books.clone()),
        cadence: compute_cadence(&dates),
        book_lengths: length_histogram(books.clone().map(|b| b.pages)),
        longest_book: longest_book(books.clone()),
        completions: series::completions(books.clone(), granularity),
        scatter: series::scatter(books, granularity),
    }
}

/// Most frequent author; ties go to whoever appears first
fn top_author<'a>(books: impl Iterator<Item = &'a BookRecord>) -> Option<String> {
    // author -> (count, first position)
    let mut tally: HashMap<&str, (usize, usize)> = HashMap::new();
    for (pos, book) in books.enumerate() {
        tally.entry(book.author.as_str()).or_insert((0, pos)).0 += 1;
    }
    tally
        .into_iter()
        .max_by(|(_, (ca, pa)), (_, (cb, pb))| ca.cmp(cb).then(pb.cmp(pa)))
        .map(|(author, _)| author.to_string())
}

fn longest_book<'a>(books: impl Iterator<Item = &'a BookRecord>) -> Option<LongestBook> {
    let mut longest: Option<&BookRecord> = None;
    let mut longest_pages = 0;
    for book in books {
        if let Some(pages) = book.pages {
            if longest.is_none() || pages > longest_pages {
                longest = Some(book);
                longest_pages = pages;
            }
        }
    }
    longest.map(|b| LongestBook {
        title: b.title.clone(),
        author: b.author.clone(),
        pages: longest_pages,
    })
}
