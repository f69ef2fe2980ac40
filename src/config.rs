use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use crate::dataset::DatasetSource;

pub const DEFAULT_MIN_APPEARANCES: u32 = 5;
/// A full 18-team league season.
pub const MAX_MIN_APPEARANCES: u32 = 34;
pub const DEFAULT_DEMO_SEED: u64 = 90;

const DEFAULT_DATA_DIR: &str = "data";

/// Runtime settings shared by the terminal front-end and the tools.
///
/// Command-line flags win over `GD_*` environment variables, which win
/// over the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source: DatasetSource,
    pub competition: Option<String>,
    pub season: Option<String>,
    pub min_appearances: u32,
    pub log_filter: String,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    pub fn from_env(args: &[String]) -> Result<Self> {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    pub fn resolve(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |flag: &str, key: &str| {
            arg_value(args, flag)
                .or_else(|| env(key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let source = if let Some(seed) = demo_flag(args) {
            DatasetSource::Demo { seed }
        } else if let Some(db) = lookup("--db", "GD_DATASET") {
            DatasetSource::Sqlite(PathBuf::from(db))
        } else {
            match (
                lookup("--appearances", "GD_APPEARANCES"),
                lookup("--matches", "GD_MATCHES"),
            ) {
                (Some(appearances), Some(matches)) => DatasetSource::Files {
                    appearances: PathBuf::from(appearances),
                    matches: PathBuf::from(matches),
                },
                (None, None) => default_source(Path::new(DEFAULT_DATA_DIR)),
                _ => bail!("appearances and matches files must be given together"),
            }
        };

        let min_appearances = lookup("--min-appearances", "GD_MIN_APPEARANCES")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MIN_APPEARANCES)
            .min(MAX_MIN_APPEARANCES);

        Ok(Self {
            source,
            competition: lookup("--competition", "GD_COMPETITION"),
            season: lookup("--season", "GD_SEASON"),
            min_appearances,
            log_filter: env("GD_LOG").unwrap_or_else(|| "info".to_string()),
            log_file: lookup("--log-file", "GD_LOG_FILE").map(PathBuf::from),
        })
    }
}

/// JSON files under `dir` when both exist, otherwise the demo seasons.
pub fn default_source(dir: &Path) -> DatasetSource {
    let appearances = dir.join("appearances.json");
    let matches = dir.join("matches.json");
    if appearances.is_file() && matches.is_file() {
        DatasetSource::Files {
            appearances,
            matches,
        }
    } else {
        DatasetSource::Demo {
            seed: DEFAULT_DEMO_SEED,
        }
    }
}

/// Value of `--flag=value` or `--flag value`.
pub fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(v) = arg.strip_prefix(&prefix)
            && !v.trim().is_empty()
        {
            return Some(v.to_string());
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.starts_with("--")
        {
            return Some(next.clone());
        }
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    let prefix = format!("{flag}=");
    args.iter().any(|a| a == flag || a.starts_with(&prefix))
}

fn demo_flag(args: &[String]) -> Option<u64> {
    if !has_flag(args, "--demo") {
        return None;
    }
    Some(
        arg_value(args, "--demo")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_DEMO_SEED),
    )
}
