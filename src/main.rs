use std::path::PathBuf;

use anyhow::Result;

use vault_synergy::config::ScorerConfig;

/// Batch entry point: no flags — configuration comes from the environment
/// and the persisted settings inside the success-metrics document.
fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // best-effort, as for every script in the suite
    tracing_subscriber::fmt::init();

    let root = std::env::var("SYNERGY_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    let cfg = ScorerConfig::from_root(&root);

    let summary = vault_synergy::run(&cfg)?;
    tracing::info!(
        notes_scored = summary.counts.notes_scored,
        pitches = summary.counts.pitches,
        insights = summary.counts.insights,
        high_disagreement = summary.counts.high_disagreement,
        "synergy run complete"
    );
    Ok(())
}
