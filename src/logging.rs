use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Where structured logs go. The terminal front-end must not write to
/// stderr while the alternate screen is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
    Off,
}

/// Install the global subscriber. `filter` uses `EnvFilter` syntax
/// (`info`, `gd_terminal=debug`, ...) and falls back to `info`.
pub fn init_logging(filter: &str, target: LogTarget) -> Result<()> {
    let env_filter = EnvFilter::try_new(filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("build log filter")?;
    let registry = tracing_subscriber::registry().with(env_filter);

    match target {
        LogTarget::Stderr => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .map_err(|err| anyhow!("install stderr logger: {err}")),
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open log file {}", path.display()))?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
                .map_err(|err| anyhow!("install file logger: {err}"))
        }
        LogTarget::Off => Ok(()),
    }
}
