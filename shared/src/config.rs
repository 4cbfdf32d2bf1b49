use std::{
    env,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};

const DEFAULT_BIND: &str = "0.0.0.0:8000";
const DEFAULT_SETTINGS_PATH: &str = "data/line_settings.toml";
const DEFAULT_EVENTS_DIR: &str = "data/events";
const DEFAULT_POLL_SECS: u64 = 5;

pub struct DashboardEnv {
    /// Address the JSON API listens on
    pub bind: SocketAddr,
    /// TOML file holding shift boundaries and aggregation settings
    pub settings_path: PathBuf,
    /// Directory the event source reads per-stage batches from
    pub events_dir: PathBuf,
    /// Period between aggregation passes
    pub poll_interval: Duration,
}

impl DashboardEnv {
    pub fn load(manifest_dir: &Path) -> Result<Self> {
        #[cfg(debug_assertions)]
        if let Err(e) = dotenvy::from_path(manifest_dir.join(".env")) {
            tracing::debug!("no .env file loaded: {e}");
        }
        #[cfg(not(debug_assertions))]
        let _ = manifest_dir;

        let bind = var_or("LINE_DASHBOARD_BIND", DEFAULT_BIND)
            .parse()
            .context("LINE_DASHBOARD_BIND must be a socket address")?;
        let poll_secs: u64 = var_or("LINE_DASHBOARD_POLL_SECS", &DEFAULT_POLL_SECS.to_string())
            .parse()
            .context("LINE_DASHBOARD_POLL_SECS must be a whole number of seconds")?;
        anyhow::ensure!(poll_secs > 0, "LINE_DASHBOARD_POLL_SECS must be > 0");

        Ok(Self {
            bind,
            settings_path: var_or("LINE_DASHBOARD_SETTINGS", DEFAULT_SETTINGS_PATH).into(),
            events_dir: var_or("LINE_DASHBOARD_EVENTS_DIR", DEFAULT_EVENTS_DIR).into(),
            poll_interval: Duration::from_secs(poll_secs),
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Load dashboard config using the calling crate's manifest directory.
#[macro_export]
macro_rules! load_dashboard_env {
    () => {
        $crate::config::DashboardEnv::load(std::path::Path::new(env!("CARGO_MANIFEST_DIR")))
    };
}
