pub mod config;
pub mod graph;
pub mod legacy;
pub mod metrics;
pub mod output;
pub mod refined;
pub mod types;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::config::ScorerConfig;
use crate::graph::{detect_para_bucket, target_category, GraphDoc, LinkGraph, VaultIndex};
use crate::legacy::{legacy_score, normalize_legacy, LinkLogDegrees, TagCooccurrence};
use crate::metrics::MetricsDoc;
use crate::refined::RefinedScorer;
use crate::types::{round6, Category, IndexEntry, RunSummary, ScoreRecord};

/// Read a JSON document. `Ok(None)` when the file does not exist — the
/// caller substitutes its empty default; a present-but-corrupt file is an
/// error the caller downgrades explicitly. Keeps "absent" and "broken"
/// distinguishable instead of collapsing both into a silent fallback.
pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(value))
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path, what: &str) -> T {
    match read_json_file(path) {
        Ok(Some(value)) => value,
        Ok(None) => {
            info!("{what} not found at {}; using empty default", path.display());
            T::default()
        }
        Err(e) => {
            warn!("{what} unreadable ({e:#}); using empty default");
            T::default()
        }
    }
}

/// One full scoring run: load the graph, index, links log, and persisted
/// settings; score every target note; write the snapshot, time series, and
/// run summary. Missing inputs degrade to zero-signal scores — the run only
/// fails on output I/O.
pub fn run(cfg: &ScorerConfig) -> Result<RunSummary> {
    info!("starting synergy computation");

    let mut doc: MetricsDoc = load_or_default(&cfg.metrics_json, "success metrics");
    let (weights, blend) = doc.resolve_settings();

    let graph_doc: GraphDoc = load_or_default(&cfg.graph_json, "note graph");
    let graph = LinkGraph::from_doc(&graph_doc);
    let entries: Vec<IndexEntry> = load_or_default(&cfg.index_json, "vault index");
    let index = VaultIndex::from_entries(entries);

    let para_bucket: HashMap<String, &'static str> = graph
        .nodes
        .iter()
        .map(|path| {
            let folder = index.meta(path).map(|m| m.folder.as_str()).unwrap_or("");
            (path.clone(), detect_para_bucket(folder))
        })
        .collect();

    // Sorted so identical inputs produce identical output files.
    let mut targets: Vec<(String, Category)> = graph
        .nodes
        .iter()
        .filter_map(|path| target_category(path).map(|cat| (path.clone(), cat)))
        .collect();
    targets.sort_by(|a, b| a.0.cmp(&b.0));
    info!(targets = targets.len(), notes_indexed = index.len(), "collected target notes");

    let degrees = match legacy::load_links_log(&cfg.links_log, blend.links_identity) {
        Ok(Some(d)) => d,
        Ok(None) => {
            info!("links log not found at {}; legacy degrees empty", cfg.links_log.display());
            LinkLogDegrees::default()
        }
        Err(e) => {
            warn!("links log unreadable ({e:#}); legacy degrees empty");
            LinkLogDegrees::default()
        }
    };
    info!(
        path_edges = degrees.path_edges,
        title_edges = degrees.title_edges,
        "links-log identity resolution"
    );
    let cooccurrence = TagCooccurrence::build(&index);

    let scorer = RefinedScorer::new(&graph, &index, &para_bucket, weights);
    let legacy_scores: Vec<_> = targets
        .iter()
        .map(|(path, _)| legacy_score(path, &index, &degrees, &cooccurrence))
        .collect();
    let mut sorted_raw: Vec<f64> = legacy_scores.iter().map(|s| s.raw).collect();
    sorted_raw.sort_by(f64::total_cmp);

    let now = chrono::Local::now();
    let run_id = now.format("%Y-%m-%dT%H:%M:%S").to_string();
    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();

    let records: Vec<ScoreRecord> = targets
        .iter()
        .zip(&legacy_scores)
        .map(|((path, category), leg)| {
            let refined = scorer.score(path);
            let refined_score = round6(refined.score);
            let legacy_norm = normalize_legacy(blend.legacy_norm, &sorted_raw, leg.raw);
            let composite =
                blend.alpha_refined * refined_score + (1.0 - blend.alpha_refined) * legacy_norm;
            ScoreRecord {
                note_path: path.clone(),
                category: *category,
                ref_link_density: round6(refined.link_density),
                ref_tag_overlap: round6(refined.tag_overlap),
                ref_ripple: round6(refined.ripple),
                refined_score,
                leg_link_score: leg.link_score,
                leg_tag_score: leg.tag_score,
                leg_ripple_effect: leg.ripple_effect,
                legacy_score_raw: round6(leg.raw),
                legacy_score_norm: round6(legacy_norm),
                composite_score: round6(composite),
                disagreement_abs: round6((refined_score - legacy_norm).abs()),
                run_id: run_id.clone(),
                timestamp: timestamp.clone(),
            }
        })
        .collect();

    output::write_snapshot(&cfg.scores_csv, &records, blend.write_aliases)?;
    info!(rows = records.len(), path = %cfg.scores_csv.display(), "snapshot written");

    let (seeds, write_header) = match output::read_last_emas(&cfg.timeseries_csv) {
        Ok(Some(seeds)) => (seeds, false),
        Ok(None) => (HashMap::new(), true),
        Err(e) => {
            // Continuity is lost for this run; history stays untouched.
            warn!("time series unreadable ({e:#}); recovering with a fresh header");
            (HashMap::new(), true)
        }
    };
    output::append_timeseries(
        &cfg.timeseries_csv,
        &records,
        &seeds,
        blend.alpha_ema(),
        write_header,
        blend.write_aliases,
    )?;
    info!(path = %cfg.timeseries_csv.display(), "time series appended");

    let summary = metrics::summarize_run(&records, &run_id, &timestamp);
    doc.append_run(&summary)?;
    metrics::save_metrics(&cfg.metrics_json, &doc)?;
    info!(path = %cfg.metrics_json.display(), "run summary appended");

    Ok(summary)
}
