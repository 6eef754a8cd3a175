//! Rank-to-scale transforms.
//!
//! Two independent schemes turn a student's standing in a score population
//! into a scaled score:
//!
//! - a fixed level table over the rank percentile (100 down to 58 in steps
//!   of 3, everything past the 99th percentile gets 40);
//! - the five-bucket "3+1+2" scheme, which places the student in a
//!   population-share bucket and interpolates linearly inside it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScaleMethod {
    LevelTable,
    Piecewise312,
}

impl ScaleMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "levelTable" => Some(Self::LevelTable),
            "piecewise312" => Some(Self::Piecewise312),
            _ => None,
        }
    }
}

/// `(upper percentile bound, scaled score)`, checked in order.
const LEVEL_BREAKPOINTS: [(u64, u32); 15] = [
    (1, 100),
    (3, 97),
    (6, 94),
    (10, 91),
    (16, 88),
    (24, 85),
    (34, 82),
    (45, 79),
    (55, 76),
    (65, 73),
    (75, 70),
    (83, 67),
    (90, 64),
    (95, 61),
    (99, 58),
];
const LEVEL_FLOOR: u32 = 40;

/// `rank` is 1-based. Returns 0 when `total` is 0.
pub fn level_table_score(rank: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    // percentile <= bound  <=>  rank * 100 <= bound * total
    let scaled_rank = (rank as u64) * 100;
    let total = total as u64;
    LEVEL_BREAKPOINTS
        .iter()
        .find(|(bound, _)| scaled_rank <= bound * total)
        .map(|(_, score)| *score)
        .unwrap_or(LEVEL_FLOOR)
}

#[derive(Debug, Clone, Copy)]
struct ScaleBucket {
    share_pct: usize,
    ceiling: f64,
    floor: f64,
}

const PIECEWISE_BUCKETS: [ScaleBucket; 5] = [
    ScaleBucket { share_pct: 15, ceiling: 100.0, floor: 86.0 },
    ScaleBucket { share_pct: 35, ceiling: 85.0, floor: 71.0 },
    ScaleBucket { share_pct: 35, ceiling: 70.0, floor: 56.0 },
    ScaleBucket { share_pct: 13, ceiling: 55.0, floor: 41.0 },
    ScaleBucket { share_pct: 2, ceiling: 40.0, floor: 30.0 },
];

/// Finite values, highest first. Equal scores keep their input order.
pub fn descending(population: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = population.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted
}

/// Number of scores strictly above `score`.
fn position_in(sorted_desc: &[f64], score: f64) -> usize {
    sorted_desc.partition_point(|v| *v > score)
}

/// 1 + number of strictly higher scores. `sorted_desc` comes from
/// [`descending`].
pub fn competition_rank(score: f64, sorted_desc: &[f64]) -> usize {
    position_in(sorted_desc, score) + 1
}

/// Scaled score under the "3+1+2" scheme, or `None` when the population is
/// empty or `score` is not a finite number. `sorted_desc` comes from
/// [`descending`], so a whole cohort is scaled against one sort.
///
/// A student's position is the count of strictly higher scores, so every
/// student sharing a score lands in the bucket where that score first
/// appears. Bucket `k` holds positions below `ceil(cumulative_share_k * n)`.
pub fn piecewise_scaled_score(score: f64, sorted_desc: &[f64]) -> Option<i64> {
    if !score.is_finite() {
        return None;
    }
    let n = sorted_desc.len();
    if n == 0 {
        return None;
    }

    let position = position_in(sorted_desc, score);
    let mut cumulative_pct = 0usize;
    let mut start = 0usize;
    let mut located: Option<(ScaleBucket, usize, usize)> = None;
    for (i, bucket) in PIECEWISE_BUCKETS.iter().enumerate() {
        cumulative_pct += bucket.share_pct;
        let end = if i + 1 == PIECEWISE_BUCKETS.len() {
            n
        } else {
            (((cumulative_pct * n) + 99) / 100).min(n)
        };
        if end > start {
            located = Some((*bucket, start, end));
            if position < end {
                break;
            }
        }
        start = end;
    }

    // Always set: n > 0, so the final bucket is non-empty or an earlier one was.
    let (bucket, start, end) = located?;
    let members = &sorted_desc[start..end];
    let hi = members[0];
    let lo = members[members.len() - 1];
    if hi == lo {
        return Some(bucket.ceiling as i64);
    }
    let ratio = ((score - lo) / (hi - lo)).clamp(0.0, 1.0);
    let scaled = bucket.floor + ratio * (bucket.ceiling - bucket.floor);
    Some((scaled + 0.5).floor() as i64)
}
