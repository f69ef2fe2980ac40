use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use gd_terminal::config::{DEFAULT_DEMO_SEED, arg_value};
use gd_terminal::fake_dataset::{FakeConfig, generate};
use gd_terminal::logging::{LogTarget, init_logging};
use gd_terminal::sqlite_dataset;

const DEFAULT_DB: &str = "data/gd_demo.sqlite";

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let filter = std::env::var("GD_LOG").unwrap_or_else(|_| "info".to_string());
    init_logging(&filter, LogTarget::Stderr)?;

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let seed = arg_value(&args, "--seed")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_DEMO_SEED);
    let teams = arg_value(&args, "--teams")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(FakeConfig::default().teams);
    let data = generate(&FakeConfig {
        seed,
        teams,
        ..FakeConfig::default()
    });

    if let Some(dir) = arg_value(&args, "--json-dir").map(PathBuf::from) {
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let appearances = dir.join("appearances.json");
        let matches = dir.join("matches.json");
        fs::write(
            &appearances,
            serde_json::to_string_pretty(&data.appearances).context("encode appearances")?,
        )
        .with_context(|| format!("write {}", appearances.display()))?;
        fs::write(
            &matches,
            serde_json::to_string_pretty(&data.matches).context("encode matches")?,
        )
        .with_context(|| format!("write {}", matches.display()))?;
        println!("Synthetic dataset written");
        println!("Appearances: {} -> {}", data.appearances.len(), appearances.display());
        println!("Matches: {} -> {}", data.matches.len(), matches.display());
        return Ok(());
    }

    let db_path = arg_value(&args, "--db")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB));
    let mut conn = sqlite_dataset::open_db(&db_path)?;
    let summary = sqlite_dataset::write_dataset(
        &mut conn,
        &format!("synthetic seed {seed}"),
        &data.appearances,
        &data.matches,
    )?;

    println!("Synthetic dataset written");
    println!("DB: {}", db_path.display());
    println!("Run: {}", summary.run_id);
    println!("Appearances upserted: {}", summary.appearances_upserted);
    println!("Matches upserted: {}", summary.matches_upserted);
    Ok(())
}
