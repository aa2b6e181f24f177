use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{Blend, BlendOverride, Weights, WeightsOverride, DISAGREE_THRESHOLD};
use crate::types::{round6, Category, RunCounts, RunSummary, ScoreRecord, ScoreStats};

/// Version tags published with every run summary so downstream reports can
/// tell which formula generation produced a row.
const METHOD_VERSIONS: [(&str, &str); 3] =
    [("refined", "1.0.1"), ("legacy", "0.9.1"), ("composite", "1.0.1")];

/// Persisted success-metrics document. Run summaries accumulate in
/// `synergy_runs`; `settings` doubles as the configuration store read back
/// on the next run. Keys written by other scripts are preserved verbatim.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MetricsDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsDoc>,
    #[serde(default)]
    pub synergy_runs: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synergy_weights: Option<WeightsOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blend: Option<BlendOverride>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MetricsDoc {
    /// Effective settings for this run: code defaults overridden per key by
    /// whatever the document carries.
    pub fn resolve_settings(&self) -> (Weights, Blend) {
        let mut weights = Weights::default();
        let mut blend = Blend::default();
        if let Some(settings) = &self.settings {
            if let Some(w) = &settings.synergy_weights {
                weights.apply(w);
            }
            if let Some(b) = &settings.blend {
                blend.apply(b);
            }
        }
        (weights, blend)
    }

    /// Append one run record and make sure defaults are persisted for any
    /// settings block the user has not created — never clobbering blocks
    /// that already exist.
    pub fn append_run(&mut self, summary: &RunSummary) -> Result<()> {
        self.synergy_runs.push(serde_json::to_value(summary)?);
        let settings = self.settings.get_or_insert_with(SettingsDoc::default);
        settings
            .synergy_weights
            .get_or_insert_with(|| Weights::default().into());
        settings.blend.get_or_insert_with(|| Blend::default().into());
        Ok(())
    }
}

/// Rewrite the whole document, pretty-printed like every other System file.
pub fn save_metrics(path: &Path, doc: &MetricsDoc) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(doc)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

impl ScoreStats {
    /// Mean, median, and p90 over one score column. The median of an even
    /// count is the mean of the two middle values; p90 indexes the sorted
    /// list at ⌊0.9·(n−1)⌋. All zero for an empty column.
    pub fn compute(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let p50 = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
        };
        let p90 = sorted[(0.9 * (n - 1) as f64) as usize];
        Self {
            mean: round6(sorted.iter().sum::<f64>() / n as f64),
            p50: round6(p50),
            p90: round6(p90),
        }
    }
}

/// Aggregate one run's records into the summary appended to the document.
pub fn summarize_run(records: &[ScoreRecord], run_id: &str, timestamp: &str) -> RunSummary {
    let collect = |f: fn(&ScoreRecord) -> f64| records.iter().map(f).collect::<Vec<f64>>();
    let counts = RunCounts {
        notes_scored: records.len(),
        pitches: records.iter().filter(|r| matches!(r.category, Category::Pitch)).count(),
        insights: records.iter().filter(|r| matches!(r.category, Category::Insight)).count(),
        high_disagreement: records
            .iter()
            .filter(|r| r.disagreement_abs > DISAGREE_THRESHOLD)
            .count(),
    };
    RunSummary {
        run_id: run_id.to_string(),
        timestamp: timestamp.to_string(),
        counts,
        refined_summary: ScoreStats::compute(&collect(|r| r.refined_score)),
        legacy_summary: ScoreStats::compute(&collect(|r| r.legacy_score_norm)),
        composite_summary: ScoreStats::compute(&collect(|r| r.composite_score)),
        method_versions: method_versions(),
    }
}

pub fn method_versions() -> BTreeMap<String, String> {
    METHOD_VERSIONS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    fn record(category: Category, refined: f64, legacy_norm: f64, disagreement: f64) -> ScoreRecord {
        ScoreRecord {
            note_path: "n.md".to_string(),
            category,
            ref_link_density: 0.0,
            ref_tag_overlap: 0.0,
            ref_ripple: 0.0,
            refined_score: refined,
            leg_link_score: 0,
            leg_tag_score: 0,
            leg_ripple_effect: 0,
            legacy_score_raw: 0.0,
            legacy_score_norm: legacy_norm,
            composite_score: 0.7 * refined + 0.3 * legacy_norm,
            disagreement_abs: disagreement,
            run_id: String::new(),
            timestamp: String::new(),
        }
    }

    #[test]
    fn stats_median_and_p90_conventions() {
        assert_eq!(ScoreStats::compute(&[]), ScoreStats::default());

        let odd = ScoreStats::compute(&[3.0, 1.0, 2.0]);
        assert_eq!(odd.p50, 2.0);
        assert_eq!(odd.mean, 2.0);
        assert_eq!(odd.p90, 2.0); // index ⌊0.9·2⌋ = 1 of [1,2,3]

        let even = ScoreStats::compute(&[4.0, 1.0, 2.0, 3.0]);
        assert_eq!(even.p50, 2.5);
        assert_eq!(even.p90, 3.0); // index ⌊0.9·3⌋ = 2 of [1,2,3,4]
    }

    #[test]
    fn summary_counts_categories_and_disagreement() {
        let records = vec![
            record(Category::Pitch, 0.9, 0.1, 0.8),
            record(Category::Pitch, 0.5, 0.5, 0.0),
            record(Category::Insight, 0.2, 0.4, 0.2),
        ];
        let summary = summarize_run(&records, "r", "t");
        assert_eq!(summary.counts.notes_scored, 3);
        assert_eq!(summary.counts.pitches, 2);
        assert_eq!(summary.counts.insights, 1);
        assert_eq!(summary.counts.high_disagreement, 1);
        assert_eq!(summary.method_versions["refined"], "1.0.1");
    }

    #[test]
    fn append_run_fills_missing_settings_only() {
        let mut doc: MetricsDoc = serde_json::from_str(
            r#"{
                "other_agent": {"kept": true},
                "settings": {"synergy_weights": {"ripple": 0.4}},
                "synergy_runs": [{"run_id": "old"}]
            }"#,
        )
        .unwrap();

        let (weights, blend) = doc.resolve_settings();
        assert_eq!(weights.ripple, 0.4);
        assert_eq!(weights.link_density, 0.45);
        assert_eq!(blend.alpha_refined, 0.70);

        let summary = summarize_run(&[], "r2", "t2");
        doc.append_run(&summary).unwrap();
        assert_eq!(doc.synergy_runs.len(), 2);

        let settings = doc.settings.as_ref().unwrap();
        // The user's partial weights block is untouched.
        let weights = settings.synergy_weights.as_ref().unwrap();
        assert_eq!(weights.ripple, Some(0.4));
        assert!(weights.link_density.is_none());
        // The absent blend block got the defaults.
        let blend = settings.blend.as_ref().unwrap();
        assert_eq!(blend.alpha_refined, Some(0.70));
        assert_eq!(blend.legacy_norm.as_deref(), Some("percentile"));

        // Foreign top-level keys survive a save/load round trip.
        let json = serde_json::to_string(&doc).unwrap();
        let reread: MetricsDoc = serde_json::from_str(&json).unwrap();
        assert!(reread.extra.contains_key("other_agent"));
    }
}
