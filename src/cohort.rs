use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// One student's scores. A subject missing from `scores` means the student
/// did not sit it (or the source value was not numeric), which is distinct
/// from a recorded zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawScoreRecord")]
pub struct ScoreRecord {
    pub id: String,
    pub name: String,
    pub class_label: String,
    pub scores: BTreeMap<String, f64>,
    pub total_score: Option<f64>,
    pub rank: Option<u32>,
}

impl ScoreRecord {
    pub fn score(&self, subject: &str) -> Option<f64> {
        self.scores.get(subject).copied()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScoreRecord {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    name: String,
    #[serde(default, alias = "class")]
    class_label: String,
    #[serde(default)]
    scores: BTreeMap<String, Value>,
    #[serde(default)]
    total_score: Value,
    #[serde(default)]
    rank: Value,
}

impl From<RawScoreRecord> for ScoreRecord {
    fn from(raw: RawScoreRecord) -> Self {
        let id = match raw.id {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        let scores = raw
            .scores
            .iter()
            .filter_map(|(subject, v)| coerce_score(v).map(|s| (subject.clone(), s)))
            .collect();
        ScoreRecord {
            id,
            name: raw.name,
            class_label: raw.class_label,
            scores,
            total_score: coerce_score(&raw.total_score),
            rank: coerce_score(&raw.rank)
                .filter(|r| *r >= 1.0 && r.fract() == 0.0 && *r <= f64::from(u32::MAX))
                .map(|r| r as u32),
        }
    }
}

/// Numbers and numeric strings pass; anything else (null, "absent", NaN) is
/// treated as "no score".
pub fn coerce_score(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Full mark and threshold lines for one subject. Lines left out are filled
/// in from the full mark when statistics are computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectConfig {
    pub full_mark: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excellent: Option<f64>,
    #[serde(
        default,
        alias = "superExcel",
        skip_serializing_if = "Option::is_none"
    )]
    pub super_excellent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
}

/// Everything one analysis session works from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cohort {
    #[serde(default)]
    pub records: Vec<ScoreRecord>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub subject_configs: BTreeMap<String, SubjectConfig>,
}

impl Cohort {
    pub fn from_json(value: Value) -> anyhow::Result<Self> {
        let mut cohort: Cohort =
            serde_json::from_value(value).context("cohort payload does not match the expected shape")?;
        if cohort.subjects.is_empty() {
            cohort.subjects = cohort.subject_configs.keys().cloned().collect();
        }
        let mut seen = Vec::with_capacity(cohort.subjects.len());
        cohort.subjects.retain(|s| {
            if seen.contains(s) {
                false
            } else {
                seen.push(s.clone());
                true
            }
        });
        Ok(cohort)
    }

    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cohort file {}", path.to_string_lossy()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("cohort file {} is not valid JSON", path.to_string_lossy()))?;
        Self::from_json(value)
    }

    /// SHA-256 of the canonical serialization. Identical snapshots share a
    /// version regardless of when or how they were loaded.
    pub fn version(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        format!("{:x}", Sha256::digest(&bytes))
    }

    /// Distinct class labels in order of first appearance.
    pub fn classes(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for r in &self.records {
            if !out.iter().any(|c| c == &r.class_label) {
                out.push(r.class_label.clone());
            }
        }
        out
    }
}

/// A cohort as held by the sidecar between requests.
#[derive(Debug, Clone)]
pub struct LoadedCohort {
    pub cohort: Cohort,
    pub version: String,
    pub loaded_at: String,
}

impl LoadedCohort {
    pub fn new(cohort: Cohort) -> Self {
        let version = cohort.version();
        Self {
            cohort,
            version,
            loaded_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
