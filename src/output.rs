use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::types::{round6, EmaTriple, ScoreRecord};

/// Snapshot column order — fixed, consumed positionally by downstream
/// reporting scripts.
pub const SNAPSHOT_COLUMNS: [&str; 15] = [
    "note_path",
    "category",
    "ref_link_density",
    "ref_tag_overlap",
    "ref_ripple",
    "refined_score",
    "leg_link_score",
    "leg_tag_score",
    "leg_ripple_effect",
    "legacy_score_raw",
    "legacy_score_norm",
    "composite_score",
    "disagreement_abs",
    "run_id",
    "timestamp",
];

/// Extra columns carried only by the time-series file.
pub const EMA_COLUMNS: [&str; 3] = ["ema_refined", "ema_legacy", "ema_composite"];

/// Optional alias columns duplicating the headline scores under their older
/// names, for dashboards that never migrated.
pub const ALIAS_COLUMNS: [&str; 3] = ["synergy_score", "synergy_refined", "synergy_legacy_norm"];

fn num(x: f64) -> String {
    // Values are pre-rounded to 6 decimals; the shortest representation
    // round-trips exactly.
    format!("{x}")
}

fn snapshot_fields(r: &ScoreRecord) -> Vec<String> {
    vec![
        r.note_path.clone(),
        r.category.as_str().to_string(),
        num(r.ref_link_density),
        num(r.ref_tag_overlap),
        num(r.ref_ripple),
        num(r.refined_score),
        r.leg_link_score.to_string(),
        r.leg_tag_score.to_string(),
        r.leg_ripple_effect.to_string(),
        num(r.legacy_score_raw),
        num(r.legacy_score_norm),
        num(r.composite_score),
        num(r.disagreement_abs),
        r.run_id.clone(),
        r.timestamp.clone(),
    ]
}

fn alias_fields(r: &ScoreRecord) -> Vec<String> {
    vec![num(r.composite_score), num(r.refined_score), num(r.legacy_score_norm)]
}

/// Write the snapshot CSV, fully replacing any previous run's file.
pub fn write_snapshot(path: &Path, records: &[ScoreRecord], write_aliases: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating snapshot {}", path.display()))?;

    let mut header: Vec<&str> = SNAPSHOT_COLUMNS.to_vec();
    if write_aliases {
        header.extend(ALIAS_COLUMNS);
    }
    writer.write_record(&header)?;
    for record in records {
        let mut fields = snapshot_fields(record);
        if write_aliases {
            fields.extend(alias_fields(record));
        }
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}

/// Scan the existing time-series file for the most recent EMA triple per
/// note path; the file is append-only, so the last row per path is the
/// latest run. `Ok(None)` when the file is missing or empty (a fresh header
/// is needed); a parse failure bubbles up so the caller can recover by
/// starting a fresh header without seeds.
pub fn read_last_emas(path: &Path) -> Result<Option<HashMap<String, EmaTriple>>> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => return Ok(None),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("inspecting {}", path.display()));
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening time series {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let col = |name: &str| headers.iter().position(|h| h == name);
    let path_col = col("note_path")
        .ok_or_else(|| anyhow!("time series {} has no note_path column", path.display()))?;
    let ema_cols = [col("ema_refined"), col("ema_legacy"), col("ema_composite")];

    let mut last: HashMap<String, EmaTriple> = HashMap::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("reading {}", path.display()))?;
        let note_path = match record.get(path_col) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => continue,
        };
        // Missing columns and empty cells both read as 0, matching the
        // file's historical tolerance; a non-numeric cell is corruption.
        let mut ema = [0.0f64; 3];
        for (slot, idx) in ema.iter_mut().zip(ema_cols) {
            let cell = idx.and_then(|i| record.get(i)).unwrap_or("").trim();
            *slot = if cell.is_empty() {
                0.0
            } else {
                cell.parse()
                    .with_context(|| format!("bad EMA value {cell:?} in {}", path.display()))?
            };
        }
        last.insert(
            note_path,
            EmaTriple { refined: ema[0], legacy: ema[1], composite: ema[2] },
        );
    }
    Ok(Some(last))
}

/// Append this run's rows (with freshly advanced EMAs) to the time-series
/// file. History is never rewritten; `write_header` is true only when the
/// file is new, empty, or being recovered after corruption.
pub fn append_timeseries(
    path: &Path,
    records: &[ScoreRecord],
    seeds: &HashMap<String, EmaTriple>,
    alpha_ema: f64,
    write_header: bool,
    write_aliases: bool,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening time series {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    if write_header {
        let mut header: Vec<&str> = SNAPSHOT_COLUMNS.to_vec();
        header.extend(EMA_COLUMNS);
        if write_aliases {
            header.extend(ALIAS_COLUMNS);
        }
        writer.write_record(&header)?;
    }

    for record in records {
        let ema = match seeds.get(&record.note_path) {
            Some(prev) => prev.advance(record, alpha_ema),
            None => EmaTriple::seed(record),
        };
        let mut fields = snapshot_fields(record);
        fields.push(num(round6(ema.refined)));
        fields.push(num(round6(ema.legacy)));
        fields.push(num(round6(ema.composite)));
        if write_aliases {
            fields.extend(alias_fields(record));
        }
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}
