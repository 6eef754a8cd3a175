use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which scores count towards `goodRate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GoodRateMode {
    /// Every score `>= good`, excellent scores included.
    AtLeastGood,
    /// Scores in `[good, excellent)`.
    Band,
}

/// How the "low" line is derived when a subject config does not supply one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LowLineMode {
    /// `0.3 * full`
    FullFraction,
    /// `0.5 * pass`
    PassFraction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSettings {
    pub good_rate_mode: GoodRateMode,
    pub low_line_mode: LowLineMode,
}

impl Default for StatisticsSettings {
    fn default() -> Self {
        Self {
            good_rate_mode: GoodRateMode::AtLeastGood,
            low_line_mode: LowLineMode::FullFraction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSettings {
    pub distribution_bins: usize,
    pub default_page_size: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            distribution_bins: 5,
            default_page_size: 50,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub statistics: StatisticsSettings,
    pub analysis: AnalysisSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSection {
    Statistics,
    Analysis,
}

impl SettingsSection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "statistics" => Some(Self::Statistics),
            "analysis" => Some(Self::Analysis),
            _ => None,
        }
    }
}

fn parse_usize_range(v: &Value, key: &str, min: usize, max: usize) -> Result<usize, String> {
    let n = v
        .as_u64()
        .ok_or_else(|| format!("{} must be a non-negative integer", key))?;
    let n = usize::try_from(n).map_err(|_| format!("{} is out of range", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_choice<'a>(v: &'a Value, key: &str, allowed: &[&str]) -> Result<&'a str, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if allowed.contains(&s) {
        Ok(s)
    } else {
        Err(format!("{} must be one of: {}", key, allowed.join(", ")))
    }
}

/// Applies a validated patch to one section. Nothing is written unless every
/// field in the patch is accepted.
pub fn merge_section_patch(
    settings: &mut Settings,
    section: SettingsSection,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let mut next = settings.clone();
    for (k, v) in patch {
        match section {
            SettingsSection::Statistics => match k.as_str() {
                "goodRateMode" => {
                    next.statistics.good_rate_mode =
                        match parse_choice(v, k, &["atLeastGood", "band"])? {
                            "band" => GoodRateMode::Band,
                            _ => GoodRateMode::AtLeastGood,
                        };
                }
                "lowLineMode" => {
                    next.statistics.low_line_mode =
                        match parse_choice(v, k, &["fullFraction", "passFraction"])? {
                            "passFraction" => LowLineMode::PassFraction,
                            _ => LowLineMode::FullFraction,
                        };
                }
                _ => return Err(format!("unknown statistics field: {}", k)),
            },
            SettingsSection::Analysis => match k.as_str() {
                "distributionBins" => {
                    next.analysis.distribution_bins = parse_usize_range(v, k, 2, 20)?;
                }
                "defaultPageSize" => {
                    next.analysis.default_page_size = parse_usize_range(v, k, 1, 500)?;
                }
                _ => return Err(format!("unknown analysis field: {}", k)),
            },
        }
    }
    *settings = next;
    Ok(())
}
