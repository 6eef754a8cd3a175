use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{class_scope, known_subject, loaded_cohort, optional_param, parse_subjects};
use crate::ipc::types::{AppState, Request};
use crate::scaling::{self, ScaleMethod};
use serde_json::json;

fn handle_statistics(state: &mut AppState, req: &Request) -> serde_json::Value {
    let loaded = match loaded_cohort(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subjects = match parse_subjects(req, "subjects", loaded, false) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_label = match optional_param(req, "classLabel") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let records = class_scope(&loaded.cohort.records, class_label.as_deref());
    let per_subject = calc::cohort_statistics(
        &records,
        &subjects,
        &loaded.cohort.subjects,
        &loaded.cohort.subject_configs,
        &state.settings.statistics,
    );
    ok(
        &req.id,
        json!({
            "cohortVersion": loaded.version,
            "classLabel": class_label,
            "settings": state.settings.statistics,
            "perSubject": per_subject
        }),
    )
}

fn handle_standard_scores(state: &mut AppState, req: &Request) -> serde_json::Value {
    let loaded = match loaded_cohort(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subjects = match parse_subjects(req, "subjects", loaded, false) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_label = match optional_param(req, "classLabel") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let records = class_scope(&loaded.cohort.records, class_label.as_deref());
    let stats = calc::cohort_statistics(
        &records,
        &subjects,
        &loaded.cohort.subjects,
        &loaded.cohort.subject_configs,
        &state.settings.statistics,
    );
    let rows = calc::standard_scores(&records, &stats, &subjects);
    ok(
        &req.id,
        json!({
            "cohortVersion": loaded.version,
            "classLabel": class_label,
            "subjects": subjects,
            "rows": rows
        }),
    )
}

fn handle_scaled_scores(state: &mut AppState, req: &Request) -> serde_json::Value {
    let loaded = match loaded_cohort(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject = match known_subject(req, loaded) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let method_raw = req
        .params
        .get("method")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let Some(method) = ScaleMethod::parse(method_raw) else {
        return err(
            &req.id,
            "bad_params",
            "method must be one of: levelTable, piecewise312",
            Some(json!({ "method": method_raw })),
        );
    };

    let records = &loaded.cohort.records;
    let population: Vec<f64> = records.iter().filter_map(|r| r.score(&subject)).collect();
    let sorted = scaling::descending(&population);
    let rows = records
        .iter()
        .map(|r| {
            let score = r.score(&subject);
            let rank = score.map(|s| scaling::competition_rank(s, &sorted));
            let scaled = match (score, rank) {
                (Some(s), Some(rank)) => match method {
                    ScaleMethod::LevelTable => {
                        Some(i64::from(scaling::level_table_score(rank, sorted.len())))
                    }
                    ScaleMethod::Piecewise312 => scaling::piecewise_scaled_score(s, &sorted),
                },
                _ => None,
            };
            json!({
                "studentId": r.id,
                "name": r.name,
                "classLabel": r.class_label,
                "score": score,
                "rank": rank,
                "scaled": scaled
            })
        })
        .collect::<Vec<_>>();

    ok(
        &req.id,
        json!({
            "cohortVersion": loaded.version,
            "subject": subject,
            "method": method,
            "population": population.len(),
            "rows": rows
        }),
    )
}

fn handle_distribution(state: &mut AppState, req: &Request) -> serde_json::Value {
    let loaded = match loaded_cohort(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject = match known_subject(req, loaded) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_label = match optional_param(req, "classLabel") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let records = class_scope(&loaded.cohort.records, class_label.as_deref());
    let scores: Vec<f64> = records.iter().filter_map(|r| r.score(&subject)).collect();
    let missing_count = records.len() - scores.len();
    let full_mark = loaded
        .cohort
        .subject_configs
        .get(&subject)
        .map(|c| c.full_mark);
    let bins = full_mark
        .map(|full| {
            calc::score_distribution(&scores, full, state.settings.analysis.distribution_bins)
        })
        .unwrap_or_default();

    ok(
        &req.id,
        json!({
            "cohortVersion": loaded.version,
            "subject": subject,
            "classLabel": class_label,
            "fullMark": full_mark,
            "bins": bins,
            "missingCount": missing_count
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.statistics" => Some(handle_statistics(state, req)),
        "analytics.standardScores" => Some(handle_standard_scores(state, req)),
        "analytics.scaledScores" => Some(handle_scaled_scores(state, req)),
        "analytics.distribution" => Some(handle_distribution(state, req)),
        _ => None,
    }
}
