//! Reading cadence: gaps in days between consecutive finish dates

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Gap statistics; all zero when fewer than two dates are known
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cadence {
    pub avg_days: f64,
    pub median_days: f64,
    pub fastest_days: i64,
    pub slowest_days: i64,
}

/// Compute cadence over finish dates in any order
pub fn compute_cadence(dates: &[NaiveDate]) -> Cadence {
    if dates.len() < 2 {
        return Cadence::default();
    }

    let mut sorted = dates.to_vec();
    sorted.sort_unstable();

    let mut gaps: Vec<i64> = sorted
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_days())
        .collect();
    gaps.sort_unstable();

    let n = gaps.len();
    let mean = gaps.iter().sum::<i64>() as f64 / n as f64;
    let median = if n % 2 == 1 {
        gaps[n / 2] as f64
    } else {
        (gaps[n / 2 - 1] + gaps[n / 2]) as f64 / 2.0
    };

    Cadence {
        avg_days: round_to(mean, 1),
        median_days: median,
        fastest_days: gaps[0],
        slowest_days: gaps[n - 1],
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
