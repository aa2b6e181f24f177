use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Absolute disagreement above which a note is flagged for manual review.
pub const DISAGREE_THRESHOLD: f64 = 0.35;

/// Weights for the three refined signals. Deliberately NOT re-normalized if a
/// user supplies values that don't sum to 1 — the effective scale of
/// refined_score simply changes with them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub link_density: f64,
    pub tag_overlap: f64,
    pub ripple: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self { link_density: 0.45, tag_overlap: 0.30, ripple: 0.25 }
    }
}

impl Weights {
    /// Apply a partial override from the persisted settings; keys the user
    /// never set keep their defaults.
    pub fn apply(&mut self, o: &WeightsOverride) {
        if let Some(v) = o.link_density {
            self.link_density = v;
        }
        if let Some(v) = o.tag_overlap {
            self.tag_overlap = v;
        }
        if let Some(v) = o.ripple {
            self.ripple = v;
        }
    }
}

/// How legacy_raw values are normalized to [0,1] within a run.
/// Anything other than "percentile" selects min-max.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegacyNormMode {
    #[default]
    Percentile,
    Minmax,
}

impl LegacyNormMode {
    pub fn from_setting(s: &str) -> Self {
        if s.eq_ignore_ascii_case("percentile") {
            LegacyNormMode::Percentile
        } else {
            LegacyNormMode::Minmax
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LegacyNormMode::Percentile => "percentile",
            LegacyNormMode::Minmax => "minmax",
        }
    }
}

/// How links-log rows are resolved to note identities.
/// Anything other than "path"/"auto" selects title-only resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityMode {
    #[default]
    Auto,
    Path,
    Title,
}

impl IdentityMode {
    pub fn from_setting(s: &str) -> Self {
        if s.eq_ignore_ascii_case("path") {
            IdentityMode::Path
        } else if s.eq_ignore_ascii_case("auto") {
            IdentityMode::Auto
        } else {
            IdentityMode::Title
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityMode::Auto => "auto",
            IdentityMode::Path => "path",
            IdentityMode::Title => "title",
        }
    }
}

/// Blend settings: how refined and legacy scores combine and how the
/// time series is smoothed.
#[derive(Debug, Clone, PartialEq)]
pub struct Blend {
    pub alpha_refined: f64,
    pub ema_span: f64,
    pub legacy_norm: LegacyNormMode,
    pub links_identity: IdentityMode,
    pub write_aliases: bool,
}

impl Default for Blend {
    fn default() -> Self {
        Self {
            alpha_refined: 0.70,
            ema_span: 5.0,
            legacy_norm: LegacyNormMode::default(),
            links_identity: IdentityMode::default(),
            write_aliases: false,
        }
    }
}

impl Blend {
    pub fn apply(&mut self, o: &BlendOverride) {
        if let Some(v) = o.alpha_refined {
            self.alpha_refined = v;
        }
        if let Some(v) = o.ema_span {
            self.ema_span = v;
        }
        if let Some(ref v) = o.legacy_norm {
            self.legacy_norm = LegacyNormMode::from_setting(v);
        }
        if let Some(ref v) = o.links_identity {
            self.links_identity = IdentityMode::from_setting(v);
        }
        if let Some(v) = o.write_aliases {
            self.write_aliases = v;
        }
    }

    /// EMA smoothing factor 2/(span+1); a non-positive span disables
    /// smoothing entirely (factor 1 — each run replaces the average).
    pub fn alpha_ema(&self) -> f64 {
        if self.ema_span > 0.0 {
            2.0 / (self.ema_span + 1.0)
        } else {
            1.0
        }
    }
}

/// Persisted shape of `settings.synergy_weights`: every key optional so a
/// hand-edited partial object still overrides just the keys it names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeightsOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_density: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_overlap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ripple: Option<f64>,
}

impl From<Weights> for WeightsOverride {
    fn from(w: Weights) -> Self {
        Self {
            link_density: Some(w.link_density),
            tag_overlap: Some(w.tag_overlap),
            ripple: Some(w.ripple),
        }
    }
}

/// Persisted shape of `settings.blend`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlendOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_refined: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema_span: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_norm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links_identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_aliases: Option<bool>,
}

impl From<Blend> for BlendOverride {
    fn from(b: Blend) -> Self {
        Self {
            alpha_refined: Some(b.alpha_refined),
            ema_span: Some(b.ema_span),
            legacy_norm: Some(b.legacy_norm.as_str().to_string()),
            links_identity: Some(b.links_identity.as_str().to_string()),
            write_aliases: Some(b.write_aliases),
        }
    }
}

/// All file paths one scorer run touches. Built once by the caller and passed
/// into [`crate::run`] — no global state, no hardcoded vault locations.
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    pub graph_json: PathBuf,
    pub index_json: PathBuf,
    pub links_log: PathBuf,
    pub scores_csv: PathBuf,
    pub timeseries_csv: PathBuf,
    pub metrics_json: PathBuf,
}

impl ScorerConfig {
    /// Conventional layout under one root: inputs in `data/`, outputs in
    /// `System/`.
    pub fn from_root(root: &Path) -> Self {
        let data = root.join("data");
        let system = root.join("System");
        Self {
            graph_json: data.join("note_graph.json"),
            index_json: data.join("vault_index.json"),
            links_log: data.join("links_log.csv"),
            scores_csv: system.join("synergy_scores.csv"),
            timeseries_csv: system.join("synergy_timeseries.csv"),
            metrics_json: system.join("success_metrics.json"),
        }
    }
}
