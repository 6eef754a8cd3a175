use crate::cohort::{Cohort, LoadedCohort};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{loaded_cohort, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn cohort_summary(loaded: &LoadedCohort) -> serde_json::Value {
    let c = &loaded.cohort;
    let unconfigured: Vec<&String> = c
        .subjects
        .iter()
        .filter(|s| !c.subject_configs.contains_key(*s))
        .collect();
    json!({
        "version": loaded.version,
        "loadedAt": loaded.loaded_at,
        "studentCount": c.records.len(),
        "subjects": c.subjects,
        "unconfiguredSubjects": unconfigured,
        "classes": c.classes()
    })
}

fn install(state: &mut AppState, cohort: Cohort) -> serde_json::Value {
    let loaded = LoadedCohort::new(cohort);
    tracing::info!(
        version = %loaded.version,
        students = loaded.cohort.records.len(),
        subjects = loaded.cohort.subjects.len(),
        "cohort loaded"
    );
    let summary = cohort_summary(&loaded);
    state.cohort = Some(loaded);
    summary
}

fn handle_cohort_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !req.params.is_object() {
        return err(&req.id, "bad_params", "params must be an object", None);
    }
    match Cohort::from_json(req.params.clone()) {
        Ok(cohort) => {
            let summary = install(state, cohort);
            ok(&req.id, summary)
        }
        Err(e) => err(&req.id, "bad_params", format!("{e:#}"), None),
    }
}

fn handle_cohort_load_file(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    match Cohort::load_file(&path) {
        Ok(cohort) => {
            let summary = install(state, cohort);
            ok(&req.id, summary)
        }
        Err(e) => {
            let message = format!("{e:#}");
            tracing::warn!(path = %path.display(), error = %message, "cohort load failed");
            err(&req.id, "load_failed", message, None)
        }
    }
}

fn handle_cohort_info(state: &mut AppState, req: &Request) -> serde_json::Value {
    match loaded_cohort(state, req) {
        Ok(loaded) => ok(&req.id, cohort_summary(loaded)),
        Err(e) => e,
    }
}

fn handle_cohort_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.cohort = None;
    ok(&req.id, json!({ "cleared": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "cohort.load" => Some(handle_cohort_load(state, req)),
        "cohort.loadFile" => Some(handle_cohort_load_file(state, req)),
        "cohort.info" => Some(handle_cohort_info(state, req)),
        "cohort.clear" => Some(handle_cohort_clear(state, req)),
        _ => None,
    }
}
