use crate::cohort::{ScoreRecord, SubjectConfig};
use crate::settings::{GoodRateMode, LowLineMode, StatisticsSettings};
use serde::Serialize;
use std::collections::BTreeMap;

/// Reserved key for the aggregate total-score statistics.
pub const TOTAL_KEY: &str = "_total";
pub const TOTAL_DISPLAY_NAME: &str = "Total";

/// Half-up rounding: `floor(x * 10^d + 0.5) / 10^d`.
pub fn round_half_up(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    ((x * scale) + 0.5).floor() / scale
}

pub fn round2(x: f64) -> f64 {
    round_half_up(x, 2)
}

/// A subject config with every line filled in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdLines {
    pub full: f64,
    pub pass: f64,
    pub good: f64,
    pub excellent: f64,
    pub super_excellent: f64,
    pub low: f64,
}

impl ThresholdLines {
    pub fn resolve(cfg: &SubjectConfig, low_mode: LowLineMode) -> Self {
        let full = cfg.full_mark;
        let pass = cfg.pass.unwrap_or(full * 0.6);
        let low = cfg.low.unwrap_or(match low_mode {
            LowLineMode::FullFraction => full * 0.3,
            LowLineMode::PassFraction => pass * 0.5,
        });
        Self {
            full,
            pass,
            good: cfg.good.unwrap_or(full * 0.7),
            excellent: cfg.excellent.unwrap_or(full * 0.8),
            super_excellent: cfg.super_excellent.unwrap_or(full * 0.9),
            low,
        }
    }
}

/// Descriptive statistics for one score population. Rates are percentages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResult {
    pub count: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub difficulty: f64,
    pub pass_rate: f64,
    pub excellent_rate: f64,
    pub good_rate: f64,
    pub fail_rate: f64,
    pub super_rate: f64,
    pub low_rate: f64,
}

/// Finite values only, ascending.
pub fn sorted_scores<I>(values: I) -> Vec<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut out: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    out.sort_by(f64::total_cmp);
    out
}

fn compute_median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

fn rate(matching: usize, count: usize) -> f64 {
    round2(100.0 * (matching as f64) / (count as f64))
}

/// `sorted` must be ascending and finite (see [`sorted_scores`]).
pub fn score_statistics(
    sorted: &[f64],
    lines: &ThresholdLines,
    good_mode: GoodRateMode,
) -> StatisticsResult {
    debug_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
    let count = sorted.len();
    if count == 0 {
        return StatisticsResult::default();
    }

    let n = count as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    let at_least = |line: f64| sorted.iter().filter(|v| **v >= line).count();
    let pass_count = at_least(lines.pass);
    let good_count = match good_mode {
        GoodRateMode::AtLeastGood => at_least(lines.good),
        GoodRateMode::Band => sorted
            .iter()
            .filter(|v| **v >= lines.good && **v < lines.excellent)
            .count(),
    };
    let low_count = sorted.iter().filter(|v| **v < lines.low).count();

    let pass_rate = rate(pass_count, count);

    StatisticsResult {
        count,
        average: round2(mean),
        min: round2(sorted[0]),
        max: round2(sorted[count - 1]),
        median: round2(compute_median(sorted)),
        variance: round2(variance),
        std_dev: round2(variance.sqrt()),
        difficulty: if lines.full > 0.0 {
            round2(mean / lines.full)
        } else {
            0.0
        },
        pass_rate,
        excellent_rate: rate(at_least(lines.excellent), count),
        good_rate: rate(good_count, count),
        fail_rate: round2(100.0 - pass_rate),
        super_rate: rate(at_least(lines.super_excellent), count),
        low_rate: rate(low_count, count),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStatistics {
    pub key: String,
    pub display_name: String,
    pub lines: ThresholdLines,
    pub stats: StatisticsResult,
}

/// Lines for the total-score population. The total covers every subject of
/// the cohort, so the lines are summed over all configured `cohort_subjects`
/// regardless of which subjects a caller asks statistics for.
pub fn total_lines(
    cohort_subjects: &[String],
    configs: &BTreeMap<String, SubjectConfig>,
    low_mode: LowLineMode,
) -> ThresholdLines {
    let mut total_cfg = SubjectConfig {
        full_mark: 0.0,
        pass: Some(0.0),
        good: Some(0.0),
        excellent: Some(0.0),
        super_excellent: None,
        low: None,
    };
    for cfg in cohort_subjects.iter().filter_map(|s| configs.get(s)) {
        let lines = ThresholdLines::resolve(cfg, low_mode);
        total_cfg.full_mark += lines.full;
        total_cfg.pass = total_cfg.pass.map(|v| v + lines.pass);
        total_cfg.good = total_cfg.good.map(|v| v + lines.good);
        total_cfg.excellent = total_cfg.excellent.map(|v| v + lines.excellent);
    }
    ThresholdLines::resolve(&total_cfg, low_mode)
}

/// Per-subject statistics in `subjects` order, followed by the total-score
/// entry under [`TOTAL_KEY`]. Subjects without a config are skipped.
pub fn cohort_statistics(
    records: &[ScoreRecord],
    subjects: &[String],
    cohort_subjects: &[String],
    configs: &BTreeMap<String, SubjectConfig>,
    settings: &StatisticsSettings,
) -> Vec<SubjectStatistics> {
    if records.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(subjects.len() + 1);
    for subject in subjects {
        let Some(cfg) = configs.get(subject) else {
            tracing::debug!(subject = %subject, "no config, skipping statistics");
            continue;
        };
        let lines = ThresholdLines::resolve(cfg, settings.low_line_mode);
        let scores = sorted_scores(records.iter().filter_map(|r| r.score(subject)));
        out.push(SubjectStatistics {
            key: subject.clone(),
            display_name: subject.clone(),
            lines,
            stats: score_statistics(&scores, &lines, settings.good_rate_mode),
        });
    }

    let total_lines = total_lines(cohort_subjects, configs, settings.low_line_mode);
    let totals = sorted_scores(records.iter().filter_map(|r| r.total_score));
    out.push(SubjectStatistics {
        key: TOTAL_KEY.to_string(),
        display_name: TOTAL_DISPLAY_NAME.to_string(),
        lines: total_lines,
        stats: score_statistics(&totals, &total_lines, settings.good_rate_mode),
    });
    out
}

pub fn find_statistics<'a>(all: &'a [SubjectStatistics], key: &str) -> Option<&'a StatisticsResult> {
    all.iter().find(|s| s.key == key).map(|s| &s.stats)
}

/// Returns `(z, t)`; `(0, 50)` when no spread is known.
pub fn standard_score(score: f64, stats: Option<&StatisticsResult>) -> (f64, f64) {
    match stats {
        Some(s) if s.std_dev > 0.0 => {
            let z = (score - s.average) / s.std_dev;
            (round2(z), round_half_up(50.0 + 10.0 * z, 1))
        }
        _ => (0.0, 50.0),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStandardScore {
    pub subject: String,
    pub score: f64,
    pub z: f64,
    pub t: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardScoreRow {
    pub student_id: String,
    pub name: String,
    pub class_label: String,
    pub total_score: Option<f64>,
    pub grade_rank: Option<u32>,
    pub scores: Vec<SubjectStandardScore>,
}

/// Attaches z/t scores for each subject a student has a score in. Totals and
/// ranks are passed through unchanged.
pub fn standard_scores(
    records: &[ScoreRecord],
    stats: &[SubjectStatistics],
    subjects: &[String],
) -> Vec<StandardScoreRow> {
    records
        .iter()
        .map(|r| {
            let scores = subjects
                .iter()
                .filter_map(|subject| {
                    let score = r.score(subject)?;
                    let (z, t) = standard_score(score, find_statistics(stats, subject));
                    Some(SubjectStandardScore {
                        subject: subject.clone(),
                        score,
                        z,
                        t,
                    })
                })
                .collect();
            StandardScoreRow {
                student_id: r.id.clone(),
                name: r.name.clone(),
                class_label: r.class_label.clone(),
                total_score: r.total_score,
                grade_rank: r.rank,
                scores,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionBin {
    pub label: String,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Equal-width bands over `[0, full]`; the last band is closed on the right.
/// Out-of-range scores are clamped into the first/last band.
pub fn score_distribution(scores: &[f64], full: f64, bins: usize) -> Vec<DistributionBin> {
    if full <= 0.0 || bins == 0 {
        return Vec::new();
    }
    let width = full / (bins as f64);
    let mut counts = vec![0usize; bins];
    for s in scores.iter().filter(|s| s.is_finite()) {
        let idx = ((s / width).floor().max(0.0) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let min = round2(width * (i as f64));
            let max = if i + 1 == bins {
                full
            } else {
                round2(width * ((i + 1) as f64))
            };
            DistributionBin {
                label: format!("{}-{}", min, max),
                min,
                max,
                count,
            }
        })
        .collect()
}
