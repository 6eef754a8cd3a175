pub mod analytics;
pub mod cohort;
pub mod core;
pub mod ranking;
pub mod settings;
