//! Completion time series and publication-vs-read scatter

use crate::models::BookRecord;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Granularity of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Year,
    Month,
}

/// One scatter point; `read_value` is a year or a month depending on the view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub read_value: i32,
    pub pub_year: i32,
    pub title: String,
}

fn read_value(book: &BookRecord, granularity: Granularity) -> Option<i32> {
    let date = book.date_read?;
    Some(match granularity {
        Granularity::Year => date.year(),
        Granularity::Month => date.month() as i32,
    })
}

/// Sparse count of completions per year or per month
pub fn completions<'a, I>(books: I, granularity: Granularity) -> BTreeMap<i32, usize>
where
    I: IntoIterator<Item = &'a BookRecord>,
{
    let mut counts = BTreeMap::new();
    for value in books.into_iter().filter_map(|b| read_value(b, granularity)) {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
}

/// Points for every dated book with a known publication year, in input order
pub fn scatter<'a, I>(books: I, granularity: Granularity) -> Vec<ScatterPoint>
where
    I: IntoIterator<Item = &'a BookRecord>,
{
    books
        .into_iter()
        .filter_map(|b| {
            Some(ScatterPoint {
                read_value: read_value(b, granularity)?,
                pub_year: b.pub_year?,
                title: b.title.clone(),
            })
        })
        .collect()
}
