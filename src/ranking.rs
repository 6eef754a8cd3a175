use crate::cohort::ScoreRecord;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// A total recomputed over a chosen subject subset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DynamicTotal {
    Participated { total: f64 },
    DidNotParticipate,
}

impl DynamicTotal {
    pub fn participated(&self) -> Option<f64> {
        match self {
            DynamicTotal::Participated { total } => Some(*total),
            DynamicTotal::DidNotParticipate => None,
        }
    }

    pub fn display_total(&self) -> f64 {
        self.participated().unwrap_or(0.0)
    }
}

/// Sum of the student's scores over `subjects`, in `subjects` order.
pub fn dynamic_total(record: &ScoreRecord, subjects: &[String]) -> DynamicTotal {
    let mut total: Option<f64> = None;
    for subject in subjects {
        if let Some(score) = record.score(subject) {
            total = Some(total.unwrap_or(0.0) + score);
        }
    }
    match total {
        Some(total) => DynamicTotal::Participated { total },
        None => DynamicTotal::DidNotParticipate,
    }
}

/// Display-only filter; it never influences rank values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankFilter {
    pub class_label: Option<String>,
    /// Case-insensitive substring of the name or id.
    pub search: Option<String>,
}

impl RankFilter {
    fn matches(&self, record: &ScoreRecord) -> bool {
        if let Some(class) = &self.class_label {
            if &record.class_label != class {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            if !record.name.to_lowercase().contains(&needle)
                && !record.id.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

fn serialize_rank<S: Serializer>(rank: &Option<usize>, s: S) -> Result<S::Ok, S::Error> {
    match rank {
        Some(r) => s.serialize_u64(*r as u64),
        None => s.serialize_str("-"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicRankRow {
    pub student_id: String,
    pub name: String,
    pub class_label: String,
    /// Scores for each selected subject, aligned with the subject list.
    pub subject_scores: Vec<Option<f64>>,
    pub total: DynamicTotal,
    pub display_total: f64,
    #[serde(serialize_with = "serialize_rank")]
    pub grade_rank: Option<usize>,
    #[serde(serialize_with = "serialize_rank")]
    pub class_rank: Option<usize>,
}

/// Participants ordered by total, highest first. The sort is stable, so ties
/// keep cohort order.
fn rank_order(totals: &[(usize, f64)]) -> Vec<usize> {
    let mut order = totals.to_vec();
    order.sort_by(|a, b| b.1.total_cmp(&a.1));
    order.into_iter().map(|(idx, _)| idx).collect()
}

/// Recomputes totals over `subjects` and ranks every participating student
/// grade-wide and within their class, then applies `filter` to pick the rows
/// returned. Rows come in grade-rank order, followed by non-participants in
/// cohort order.
pub fn dynamic_rank_table(
    records: &[ScoreRecord],
    subjects: &[String],
    filter: &RankFilter,
) -> Vec<DynamicRankRow> {
    let totals: Vec<DynamicTotal> = records.iter().map(|r| dynamic_total(r, subjects)).collect();

    let participants: Vec<(usize, f64)> = totals
        .iter()
        .enumerate()
        .filter_map(|(idx, t)| t.participated().map(|v| (idx, v)))
        .collect();

    let grade_order = rank_order(&participants);
    let mut grade_rank: Vec<Option<usize>> = vec![None; records.len()];
    for (pos, idx) in grade_order.iter().enumerate() {
        grade_rank[*idx] = Some(pos + 1);
    }

    let mut by_class: HashMap<&str, Vec<(usize, f64)>> = HashMap::new();
    for (idx, total) in &participants {
        by_class
            .entry(records[*idx].class_label.as_str())
            .or_default()
            .push((*idx, *total));
    }
    let mut class_rank: Vec<Option<usize>> = vec![None; records.len()];
    for group in by_class.values() {
        for (pos, idx) in rank_order(group).iter().enumerate() {
            class_rank[*idx] = Some(pos + 1);
        }
    }

    let non_participants = (0..records.len()).filter(|idx| grade_rank[*idx].is_none());
    grade_order
        .iter()
        .copied()
        .chain(non_participants)
        .filter(|idx| filter.matches(&records[*idx]))
        .map(|idx| {
            let r = &records[idx];
            DynamicRankRow {
                student_id: r.id.clone(),
                name: r.name.clone(),
                class_label: r.class_label.clone(),
                subject_scores: subjects.iter().map(|s| r.score(s)).collect(),
                total: totals[idx],
                display_total: totals[idx].display_total(),
                grade_rank: grade_rank[idx],
                class_rank: class_rank[idx],
            }
        })
        .collect()
}
