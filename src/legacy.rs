use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{IdentityMode, LegacyNormMode};
use crate::graph::VaultIndex;

/// Degree tallies from the links-log CSV, kept separately by path and by
/// title because the log has carried both identity schemes over time.
#[derive(Debug, Default)]
pub struct LinkLogDegrees {
    pub by_path: HashMap<String, u64>,
    pub by_title: HashMap<String, u64>,
    pub path_edges: u64,
    pub title_edges: u64,
}

impl LinkLogDegrees {
    /// Degree for one note: path entry if the log knows the path, otherwise
    /// the title entry, otherwise zero.
    pub fn degree(&self, path: &str, title: &str) -> u64 {
        self.by_path
            .get(path)
            .or_else(|| self.by_title.get(title))
            .copied()
            .unwrap_or(0)
    }
}

/// Read the links log, resolving each row to identities per `mode`.
/// `Ok(None)` when the file does not exist; parse-level failures bubble up
/// so the caller can degrade to an empty tally with a warning.
pub fn load_links_log(path: &Path, mode: IdentityMode) -> Result<Option<LinkLogDegrees>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening links log {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("reading links log header {}", path.display()))?
        .clone();
    let col = |name: &str| headers.iter().position(|h| h == name);
    let (sp_col, tp_col) = (col("source_path"), col("target_path"));
    let (st_col, tt_col) = (col("source"), col("target"));

    let mut degrees = LinkLogDegrees::default();
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("skipping malformed links-log row: {e}");
                continue;
            }
        };
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").trim();
        let s_path = field(sp_col);
        let t_path = field(tp_col);
        let s_title = field(st_col);
        let t_title = field(tt_col);

        // In auto mode a row counts by path as soon as either endpoint
        // carries one; the other endpoint still falls back to its title.
        let use_path = match mode {
            IdentityMode::Path => true,
            IdentityMode::Title => false,
            IdentityMode::Auto => !s_path.is_empty() || !t_path.is_empty(),
        };

        for (path_id, title_id) in [(s_path, s_title), (t_path, t_title)] {
            if use_path {
                if !path_id.is_empty() {
                    *degrees.by_path.entry(path_id.to_string()).or_default() += 1;
                    degrees.path_edges += 1;
                } else if !title_id.is_empty() {
                    *degrees.by_title.entry(title_id.to_string()).or_default() += 1;
                    degrees.title_edges += 1;
                }
            } else if !title_id.is_empty() {
                *degrees.by_title.entry(title_id.to_string()).or_default() += 1;
                degrees.title_edges += 1;
            }
        }
    }

    Ok(Some(degrees))
}

/// Global tag co-occurrence over the whole index: tag → distinct titles
/// carrying it, plus each note's tag list keyed by title.
#[derive(Debug, Default)]
pub struct TagCooccurrence {
    titles_by_tag: HashMap<String, HashSet<String>>,
    tags_by_title: HashMap<String, Vec<String>>,
}

impl TagCooccurrence {
    pub fn build(index: &VaultIndex) -> Self {
        let mut co = Self::default();
        for (_, meta) in index.iter() {
            for tag in &meta.tags {
                co.titles_by_tag
                    .entry(tag.clone())
                    .or_default()
                    .insert(meta.title.clone());
            }
            // Later index entries overwrite earlier ones for a shared title.
            co.tags_by_title.insert(meta.title.clone(), meta.tags.clone());
        }
        co
    }

    fn tags_for_title(&self, title: &str) -> &[String] {
        self.tags_by_title.get(title).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// The legacy sub-scores: raw counts, deliberately unnormalized.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LegacyScore {
    pub link_score: u64,
    pub tag_score: u64,
    pub ripple_effect: u64,
    pub raw: f64,
}

/// The older scoring formula, retained for cross-validation against the
/// refined scorer: 0.4·links + 0.4·tag co-occurrence + 0.2·(|tags|·links).
pub fn legacy_score(
    note_path: &str,
    index: &VaultIndex,
    degrees: &LinkLogDegrees,
    cooccurrence: &TagCooccurrence,
) -> LegacyScore {
    let title = index.meta(note_path).map(|m| m.title.as_str()).unwrap_or("");
    let link_score = degrees.degree(note_path, title);
    let tags = cooccurrence.tags_for_title(title);
    let tag_score: u64 = tags
        .iter()
        .filter_map(|t| cooccurrence.titles_by_tag.get(t))
        .map(|titles| titles.len() as u64)
        .sum();
    let ripple_effect = tags.len() as u64 * link_score;
    let raw =
        0.4 * link_score as f64 + 0.4 * tag_score as f64 + 0.2 * ripple_effect as f64;
    LegacyScore { link_score, tag_score, ripple_effect, raw }
}

/// Percentile rank of `x` within `sorted`: the fraction of values ≤ x,
/// clamped to [0,1]. Empty input ranks 0.
pub fn percentile_rank(sorted: &[f64], x: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let at_or_below = sorted.partition_point(|v| *v <= x);
    (at_or_below as f64 / sorted.len() as f64).clamp(0.0, 1.0)
}

/// Linear min-max rescale; 0 when the values are empty or all equal.
pub fn minmax_rank(values: &[f64], x: f64) -> f64 {
    let (Some(min), Some(max)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) else {
        return 0.0;
    };
    if max == min {
        0.0
    } else {
        (x - min) / (max - min)
    }
}

/// Normalize one legacy_raw against this run's values. `sorted` must be the
/// run's values in ascending order (only percentile mode depends on order).
pub fn normalize_legacy(mode: LegacyNormMode, sorted: &[f64], x: f64) -> f64 {
    match mode {
        LegacyNormMode::Percentile => percentile_rank(sorted, x),
        LegacyNormMode::Minmax => minmax_rank(sorted, x),
    }
}
