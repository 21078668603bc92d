//! Page-length histogram

use crate::models::MAX_PAGES;
use serde::{Deserialize, Serialize};

/// Bucket width in pages
pub const BUCKET_WIDTH: u32 = 100;

/// Label of the bucket holding books without a page count
pub const UNKNOWN_BUCKET: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthBucket {
    /// e.g. `"200-299"`
    pub range: String,
    pub count: usize,
}

/// Fixed-width buckets spanning the observed min..max page counts
///
/// Buckets between the extremes are present even when empty. Books with no
/// page count, or one above [`MAX_PAGES`], land in a trailing
/// [`UNKNOWN_BUCKET`], so counts always sum to the number of inputs.
pub fn length_histogram<I>(pages: I) -> Vec<LengthBucket>
where
    I: IntoIterator<Item = Option<u32>>,
{
    let mut known = Vec::new();
    let mut unknown = 0;
    for p in pages {
        match p {
            Some(p) if p <= MAX_PAGES => known.push(p),
            _ => unknown += 1,
        }
    }

    let mut buckets = Vec::new();
    if let (Some(min), Some(max)) = (known.iter().min(), known.iter().max()) {
        let first = (min / BUCKET_WIDTH) as usize;
        let last = (max / BUCKET_WIDTH) as usize;
        let mut counts = vec![0usize; last - first + 1];
        for p in &known {
            counts[*p as usize / BUCKET_WIDTH as usize - first] += 1;
        }
        buckets.extend(counts.into_iter().enumerate().map(|(i, count)| {
            let lo = (first + i) as u64 * u64::from(BUCKET_WIDTH);
            LengthBucket {
                range: format!("{}-{}", lo, lo + u64::from(BUCKET_WIDTH) - 1),
                count,
            }
        }));
    }

    if unknown > 0 {
        buckets.push(LengthBucket {
            range: UNKNOWN_BUCKET.to_string(),
            count: unknown,
        });
    }

    buckets
}
