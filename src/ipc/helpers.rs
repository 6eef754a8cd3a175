use crate::cohort::{LoadedCohort, ScoreRecord};
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use std::collections::HashSet;

pub fn loaded_cohort<'a>(state: &'a AppState, req: &Request) -> Result<&'a LoadedCohort, Value> {
    state
        .cohort
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_cohort", "load a cohort first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Trimmed string, `None` when absent, null or blank.
pub fn optional_str(v: Option<&Value>, key: &str) -> Result<Option<String>, String> {
    let Some(value) = v else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    let Some(raw) = value.as_str() else {
        return Err(format!("{} must be string or null", key));
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(trimmed.to_string()))
}

pub fn optional_param(req: &Request, key: &str) -> Result<Option<String>, Value> {
    optional_str(req.params.get(key), key).map_err(|m| err(&req.id, "bad_params", m, None))
}

/// Subject selection from `params[key]`. Absent means every cohort subject;
/// present must be a non-empty list of known subjects (duplicates dropped).
pub fn parse_subjects(
    req: &Request,
    key: &str,
    cohort: &LoadedCohort,
    required: bool,
) -> Result<Vec<String>, Value> {
    let raw = match req.params.get(key) {
        None | Some(Value::Null) if !required => return Ok(cohort.cohort.subjects.clone()),
        None | Some(Value::Null) => {
            return Err(err(&req.id, "bad_params", format!("missing {}", key), None))
        }
        Some(v) => v,
    };
    let Some(items) = raw.as_array() else {
        return Err(err(
            &req.id,
            "bad_params",
            format!("{} must be an array of subject names", key),
            None,
        ));
    };
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for v in items {
        let Some(name) = v.as_str().map(str::trim) else {
            return Err(err(
                &req.id,
                "bad_params",
                format!("{} must contain only strings", key),
                None,
            ));
        };
        if !cohort.cohort.subjects.iter().any(|s| s == name) {
            return Err(err(
                &req.id,
                "bad_params",
                "unknown subject",
                Some(json!({ "subject": name })),
            ));
        }
        if seen.insert(name.to_string()) {
            out.push(name.to_string());
        }
    }
    if out.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            format!("{} must contain at least one subject", key),
            None,
        ));
    }
    Ok(out)
}

pub fn known_subject(req: &Request, cohort: &LoadedCohort) -> Result<String, Value> {
    let subject = required_str(req, "subject")?;
    if !cohort.cohort.subjects.contains(&subject) {
        return Err(err(
            &req.id,
            "bad_params",
            "unknown subject",
            Some(json!({ "subject": subject })),
        ));
    }
    Ok(subject)
}

/// Records restricted to one class label, or all of them.
pub fn class_scope(records: &[ScoreRecord], class_label: Option<&str>) -> Vec<ScoreRecord> {
    match class_label {
        Some(label) => records
            .iter()
            .filter(|r| r.class_label == label)
            .cloned()
            .collect(),
        None => records.to_vec(),
    }
}

pub fn parse_page(req: &Request) -> Result<usize, Value> {
    let Some(value) = req.params.get("page").filter(|v| !v.is_null()) else {
        return Ok(1);
    };
    match value.as_u64() {
        Some(p) if p >= 1 => Ok(p as usize),
        _ => Err(err(&req.id, "bad_params", "page must be an integer >= 1", None)),
    }
}

pub fn parse_page_size(req: &Request, default: usize) -> Result<usize, Value> {
    let Some(value) = req.params.get("pageSize").filter(|v| !v.is_null()) else {
        return Ok(default);
    };
    match value.as_u64() {
        Some(n) if (1..=500).contains(&n) => Ok(n as usize),
        _ => Err(err(
            &req.id,
            "bad_params",
            "pageSize must be in range 1..=500",
            None,
        )),
    }
}

pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Vec<T> {
    let start = page.saturating_sub(1).saturating_mul(page_size);
    if start >= items.len() {
        return Vec::new();
    }
    let end = std::cmp::min(start + page_size, items.len());
    items[start..end].to_vec()
}
