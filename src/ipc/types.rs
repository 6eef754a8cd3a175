use crate::cohort::LoadedCohort;
use crate::settings::Settings;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Session state owned by the request loop. Handlers hand immutable views of
/// it to the engine; nothing in the engine keeps a reference.
#[derive(Debug, Default)]
pub struct AppState {
    pub cohort: Option<LoadedCohort>,
    pub settings: Settings,
}
