use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    loaded_cohort, optional_str, paginate, parse_page, parse_page_size, parse_subjects,
};
use crate::ipc::types::{AppState, Request};
use crate::ranking::{dynamic_rank_table, RankFilter};
use serde_json::json;

fn parse_filter(req: &Request) -> Result<RankFilter, serde_json::Value> {
    let Some(raw) = req.params.get("filter").filter(|v| !v.is_null()) else {
        return Ok(RankFilter::default());
    };
    let Some(obj) = raw.as_object() else {
        return Err(err(&req.id, "bad_params", "filter must be an object", None));
    };
    let class_label = optional_str(obj.get("classLabel"), "filter.classLabel")
        .map_err(|m| err(&req.id, "bad_params", m, None))?;
    let search = optional_str(obj.get("search"), "filter.search")
        .map_err(|m| err(&req.id, "bad_params", m, None))?;
    Ok(RankFilter {
        class_label,
        search,
    })
}

fn handle_ranking_table(state: &mut AppState, req: &Request) -> serde_json::Value {
    let loaded = match loaded_cohort(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subjects = match parse_subjects(req, "subjects", loaded, true) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filter = match parse_filter(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let page = match parse_page(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let page_size = match parse_page_size(req, state.settings.analysis.default_page_size) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let rows = dynamic_rank_table(&loaded.cohort.records, &subjects, &filter);
    let participant_count = rows.iter().filter(|r| r.grade_rank.is_some()).count();
    ok(
        &req.id,
        json!({
            "cohortVersion": loaded.version,
            "subjects": subjects,
            "filter": {
                "classLabel": filter.class_label,
                "search": filter.search
            },
            "totalRows": rows.len(),
            "rankedRows": participant_count,
            "page": page,
            "pageSize": page_size,
            "rows": paginate(&rows, page, page_size)
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "ranking.table" => Some(handle_ranking_table(state, req)),
        _ => None,
    }
}
