//! Prometheus metrics for a single run.
//!
//! The process is short-lived, so instead of serving `/metrics` the rendered
//! metrics are written to a file picked up by the node exporter's textfile
//! collector.

use std::path::{Path, PathBuf};

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{debug, info};

use crate::config::MetricsConfig;

/// Histogram buckets in seconds. Matview refreshes run from milliseconds to
/// tens of minutes.
const DURATION_BUCKETS: &[f64] = &[
    0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0, 1800.0,
];

/// Installed recorder plus where to write its output.
pub struct MetricsExporter {
    handle: PrometheusHandle,
    path: PathBuf,
}

impl MetricsExporter {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write the rendered metrics, replacing the file atomically.
    pub fn write(&self) -> anyhow::Result<()> {
        write_atomically(&self.path, &self.render())?;
        info!(path = %self.path.display(), "Metrics written");
        Ok(())
    }
}

/// Install the global Prometheus recorder when metrics are enabled.
pub fn init_metrics(config: &MetricsConfig) -> anyhow::Result<Option<MetricsExporter>> {
    if !config.enabled {
        debug!("Metrics disabled");
        return Ok(None);
    }

    let path = config
        .textfile_path
        .clone()
        .context("metrics.textfile_path must be set when metrics are enabled")?;

    let handle = PrometheusBuilder::new()
        .set_buckets(DURATION_BUCKETS)
        .context("Failed to set histogram buckets")?
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    Ok(Some(MetricsExporter { handle, path }))
}

fn write_atomically(path: &Path, contents: &str) -> anyhow::Result<()> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, contents)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move metrics into {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_installs_nothing() {
        let exporter = init_metrics(&MetricsConfig::default()).unwrap();
        assert!(exporter.is_none());
    }

    #[test]
    fn test_enabled_without_path_is_an_error() {
        let config = MetricsConfig {
            enabled: true,
            textfile_path: None,
        };
        assert!(init_metrics(&config).is_err());
    }

    #[test]
    fn test_write_atomically_replaces_file() {
        let dir = std::env::temp_dir().join(format!("matview-cron-metrics-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("matview.prom");

        write_atomically(&path, "first 1\n").unwrap();
        write_atomically(&path, "second 2\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second 2\n");
        assert!(!path.with_extension("prom.tmp").exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
