use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Which Express shelf a target note lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Pitch,
    Insight,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Pitch => "pitch",
            Category::Insight => "insight",
        }
    }
}

/// Metadata kept per indexed note. Body is never loaded — the scorer only
/// needs the vocabulary (tags) and the folder for PARA classification.
#[derive(Debug, Clone, Default)]
pub struct NoteMeta {
    pub title: String,
    pub tags: Vec<String>,
    pub folder: String,
}

/// One row of the externally-produced vault index document.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexEntry {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "de_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub folder: String,
}

/// The indexer has emitted tags both as a JSON list and as a single
/// comma-separated string depending on its version; accept both.
fn de_tags<'de, D>(de: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TagField {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Option::<TagField>::deserialize(de)? {
        None => Vec::new(),
        Some(TagField::List(tags)) => tags,
        Some(TagField::Joined(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect(),
    })
}

/// One fully scored target note — one per note per run.
/// Float fields are already rounded to 6 decimal places.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub note_path: String,
    pub category: Category,
    pub ref_link_density: f64,
    pub ref_tag_overlap: f64,
    pub ref_ripple: f64,
    pub refined_score: f64,
    pub leg_link_score: u64,
    pub leg_tag_score: u64,
    pub leg_ripple_effect: u64,
    pub legacy_score_raw: f64,
    pub legacy_score_norm: f64,
    pub composite_score: f64,
    pub disagreement_abs: f64,
    pub run_id: String,
    pub timestamp: String,
}

/// Exponentially smoothed (refined, legacy, composite) triple for one note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaTriple {
    pub refined: f64,
    pub legacy: f64,
    pub composite: f64,
}

impl EmaTriple {
    /// Seed for a note with no prior time-series history: the current raw
    /// values, i.e. no smoothing lag on first appearance.
    pub fn seed(record: &ScoreRecord) -> Self {
        Self {
            refined: record.refined_score,
            legacy: record.legacy_score_norm,
            composite: record.composite_score,
        }
    }

    /// Standard EMA recurrence: e1 = e0 + alpha * (x - e0), per component.
    pub fn advance(&self, record: &ScoreRecord, alpha: f64) -> Self {
        Self {
            refined: self.refined + alpha * (record.refined_score - self.refined),
            legacy: self.legacy + alpha * (record.legacy_score_norm - self.legacy),
            composite: self.composite + alpha * (record.composite_score - self.composite),
        }
    }
}

/// Mean / median / p90 over one score column of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub notes_scored: usize,
    pub pitches: usize,
    pub insights: usize,
    pub high_disagreement: usize,
}

/// Aggregate record appended to `synergy_runs` in the metrics document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub timestamp: String,
    pub counts: RunCounts,
    pub refined_summary: ScoreStats,
    pub legacy_summary: ScoreStats,
    pub composite_summary: ScoreStats,
    pub method_versions: BTreeMap<String, String>,
}

/// Round to 6 decimal places — the precision every published score carries.
pub fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}
