//! The `matview-cron` application.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::Utc;
use domain::models::JobCatalog;
use persistence::{db, PgTransactionRunner};
use tracing::{info, warn};

use crate::bootstrap::{App, AppConfig, CommandLineArgs};
use crate::config::Settings;
use crate::jobs::JobRunner;
use crate::metrics::init_metrics;
use crate::signals::Shutdown;

/// Command-line flags of `matview-cron`.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct MatviewArgs {
    /// Name of the job to run
    #[arg(long, value_name = "NAME")]
    pub job: Option<String>,

    /// Run date for backfill jobs, defaults to now (UTC)
    #[arg(long, value_name = "DATETIME")]
    pub date: Option<String>,

    /// Print the job catalog in dependency order and exit
    #[arg(long)]
    pub list: bool,
}

impl CommandLineArgs for MatviewArgs {
    fn into_overrides(self) -> Vec<(String, String)> {
        let mut values = Vec::new();
        if let Some(job) = self.job {
            values.push(("job.name".to_string(), job));
        }
        if let Some(date) = self.date {
            values.push(("job.run_date".to_string(), date));
        }
        if self.list {
            values.push(("job.list".to_string(), "true".to_string()));
        }
        values
    }
}

/// Runs one matview stored procedure, or lists the catalog.
pub struct MatviewCronApp {
    settings: Settings,
    shutdown: Shutdown,
}

impl MatviewCronApp {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn catalog(&self) -> anyhow::Result<JobCatalog> {
        JobCatalog::new(
            domain::models::matview_jobs(),
            self.settings.catalog.external_jobs.iter().cloned(),
        )
        .context("Invalid job catalog")
    }

    async fn run_job(&mut self, catalog: &JobCatalog, name: &str) -> anyhow::Result<i32> {
        let job = catalog.require(name)?;

        let requested = self.settings.job.run_date()?;
        let run_date = if job.mode.is_backfill() {
            Some(requested.unwrap_or_else(|| Utc::now().naive_utc()))
        } else {
            if requested.is_some() {
                warn!(job = %job.name, "Ignoring run date for a simple job");
            }
            None
        };

        let exporter = init_metrics(&self.settings.metrics)?;

        let pool = db::create_pool(&db::DatabaseConfig::from(&self.settings.database))
            .await
            .context("Failed to connect to the database")?;
        let runner = JobRunner::new(Arc::new(PgTransactionRunner::new(pool.clone())));

        let status = runner
            .run_until_shutdown(job, run_date, &mut self.shutdown)
            .await;
        pool.close().await;

        if let Some(exporter) = exporter {
            exporter.write()?;
        }

        info!(job = %job.name, exit_code = status.exit_code(), "Run finished");
        Ok(status.exit_code())
    }
}

#[async_trait::async_trait]
impl App for MatviewCronApp {
    const NAME: &'static str = "matview-cron";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");
    const DESCRIPTION: &'static str = "Run certain matview stored procedures";
    const DEFAULTS: &'static str = crate::config::DEFAULTS;

    type Args = MatviewArgs;

    fn new(config: AppConfig, shutdown: Shutdown) -> anyhow::Result<Self> {
        let settings: Settings = config.deserialize()?;
        settings.validate()?;
        Ok(Self { settings, shutdown })
    }

    async fn main(&mut self) -> anyhow::Result<i32> {
        let catalog = self.catalog()?;

        if self.settings.job.list {
            print!("{}", format_catalog(&catalog));
            return Ok(0);
        }

        let name = self
            .settings
            .job
            .name
            .clone()
            .ok_or_else(|| anyhow!("No job given, use --job NAME or --list"))?;

        self.run_job(&catalog, &name).await
    }
}

/// The catalog in dependency order, one job per paragraph.
pub fn format_catalog(catalog: &JobCatalog) -> String {
    let width = catalog.iter().map(|job| job.name.len()).max().unwrap_or(0);
    let mut out = String::new();

    for job in catalog.dependency_order() {
        let _ = writeln!(
            out,
            "{:<width$}  {}  {}",
            job.name,
            job.procedure_name,
            job.mode,
            width = width
        );
        if !job.dependencies.is_empty() {
            let dependencies: Vec<String> = job
                .dependencies
                .iter()
                .map(|d| {
                    if catalog.is_external(d) {
                        format!("{} (external)", d)
                    } else {
                        d.clone()
                    }
                })
                .collect();
            let _ = writeln!(out, "{:<width$}  depends on: {}", "", dependencies.join(", "));
        }
        if !job.description.is_empty() {
            let _ = writeln!(out, "{:<width$}  {}", "", job.description);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::JobDescriptor;

    #[test]
    fn test_args_into_overrides() {
        let args = MatviewArgs {
            job: Some("adu-matview".into()),
            date: Some("2014-03-15".into()),
            list: false,
        };
        assert_eq!(
            args.into_overrides(),
            vec![
                ("job.name".to_string(), "adu-matview".to_string()),
                ("job.run_date".to_string(), "2014-03-15".to_string()),
            ]
        );

        let list = MatviewArgs {
            list: true,
            ..Default::default()
        };
        assert_eq!(
            list.into_overrides(),
            vec![("job.list".to_string(), "true".to_string())]
        );
        assert!(MatviewArgs::default().into_overrides().is_empty());
    }

    #[test]
    fn test_format_catalog_dependency_order() {
        let catalog = JobCatalog::matviews().unwrap();
        let listing = format_catalog(&catalog);

        let position = |name: &str| {
            listing
                .lines()
                .position(|line| line.starts_with(name))
                .unwrap_or_else(|| panic!("{} missing from listing", name))
        };

        assert!(position("reports-clean") < position("adu-matview"));
        assert!(position("reports-clean") < position("signatures-matview"));
        assert!(position("reports-clean") < position("product-versions-matview"));
        assert!(listing.contains("fetch-adi-from-hive (external)"));
        assert!(listing.contains("update_graphics_devices"));
        assert!(listing.contains("backfill (shifted back 2h)"));
    }

    #[test]
    fn test_format_catalog_small() {
        let catalog = JobCatalog::new(
            vec![
                JobDescriptor::simple("b", "proc_b").depends_on(["a"]),
                JobDescriptor::simple("a", "proc_a").described("first"),
            ],
            Vec::<String>::new(),
        )
        .unwrap();

        assert_eq!(
            format_catalog(&catalog),
            "a  proc_a  simple\n   first\nb  proc_b  simple\n   depends on: a\n"
        );
    }

    #[test]
    fn test_format_empty_catalog() {
        let catalog = JobCatalog::new(Vec::new(), Vec::<String>::new()).unwrap();
        assert_eq!(format_catalog(&catalog), "");
    }
}
