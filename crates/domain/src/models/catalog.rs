//! The job catalog: every matview job, looked up by name.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{CatalogError, JobError};

use super::job::{DateStrategy, JobDescriptor};

/// Jobs owned by other pipelines that matview jobs may wait on.
pub const DEFAULT_EXTERNAL_JOBS: &[&str] = &["fetch-adi-from-hive"];

/// The matview jobs run by the crash pipeline.
pub fn matview_jobs() -> Vec<JobDescriptor> {
    vec![
        JobDescriptor::simple("product-versions-matview", "update_product_versions")
            .depends_on(["reports-clean"])
            .described(
                "Updates product_versions and product_versions_builds tables from releases_raw",
            ),
        JobDescriptor::backfill("signatures-matview", "update_signatures")
            .depends_on(["reports-clean"])
            .described(
                "Updates signatures, signatures_products and signature_products_rollup from reports",
            ),
        JobDescriptor::backfill("adu-matview", "update_adu")
            .depends_on(["fetch-adi-from-hive", "reports-clean"])
            .described("Updates product_adu from raw_adi"),
        JobDescriptor::backfill("build-adu-matview", "update_build_adu")
            .depends_on(["fetch-adi-from-hive", "reports-clean"])
            .described("Updates build_adu from raw_adi"),
        JobDescriptor::backfill("reports-clean", "update_reports_clean")
            .with_strategy(DateStrategy::Shifted { hours: 2 })
            .described(
                "Updates reports_bad, reports_clean, reports_user_info and signatures from reports",
            ),
        JobDescriptor::backfill("graphics-device-matview", "update_graphics_devices")
            .described("Updates graphics_device with new data from raw_crashes"),
    ]
}

/// A validated set of jobs.
///
/// Names are unique, every dependency names a catalog job or a declared
/// external job, and the dependency graph is acyclic.
#[derive(Debug, Clone)]
pub struct JobCatalog {
    jobs: Vec<JobDescriptor>,
    index: HashMap<String, usize>,
    external: BTreeSet<String>,
    order: Vec<usize>,
}

impl JobCatalog {
    /// Build a catalog, checking its invariants.
    pub fn new<I, S>(jobs: Vec<JobDescriptor>, external: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let external: BTreeSet<String> = external.into_iter().map(Into::into).collect();

        let mut index = HashMap::with_capacity(jobs.len());
        for (i, job) in jobs.iter().enumerate() {
            if index.insert(job.name.clone(), i).is_some() {
                return Err(CatalogError::DuplicateJob(job.name.clone()));
            }
            if !job.has_valid_procedure_name() {
                return Err(CatalogError::InvalidProcedureName {
                    job: job.name.clone(),
                    procedure: job.procedure_name.clone(),
                });
            }
        }

        if let Some(name) = external.iter().find(|name| index.contains_key(*name)) {
            return Err(CatalogError::ExternalShadowsJob(name.clone()));
        }

        for job in &jobs {
            for dependency in &job.dependencies {
                if !index.contains_key(dependency) && !external.contains(dependency) {
                    return Err(CatalogError::UnknownDependency {
                        job: job.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        let order = topological_order(&jobs, &index)?;

        Ok(Self {
            jobs,
            index,
            external,
            order,
        })
    }

    /// The matview catalog with the default external jobs.
    pub fn matviews() -> Result<Self, CatalogError> {
        Self::new(matview_jobs(), DEFAULT_EXTERNAL_JOBS.iter().copied())
    }

    pub fn get(&self, name: &str) -> Option<&JobDescriptor> {
        self.index.get(name).map(|&i| &self.jobs[i])
    }

    /// Look up a job, failing with [`JobError::UnknownJob`].
    pub fn require(&self, name: &str) -> Result<&JobDescriptor, JobError> {
        self.get(name)
            .ok_or_else(|| JobError::UnknownJob(name.to_string()))
    }

    /// Jobs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &JobDescriptor> {
        self.jobs.iter()
    }

    /// Jobs ordered so that every job comes after the catalog jobs it depends on.
    pub fn dependency_order(&self) -> Vec<&JobDescriptor> {
        self.order.iter().map(|&i| &self.jobs[i]).collect()
    }

    pub fn is_external(&self, name: &str) -> bool {
        self.external.contains(name)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Kahn's algorithm over catalog-internal edges. Ties keep declaration order.
fn topological_order(
    jobs: &[JobDescriptor],
    index: &HashMap<String, usize>,
) -> Result<Vec<usize>, CatalogError> {
    let mut pending: Vec<usize> = vec![0; jobs.len()];
    let mut dependents: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

    for (i, job) in jobs.iter().enumerate() {
        let internal: HashSet<usize> = job
            .dependencies
            .iter()
            .filter_map(|d| index.get(d).copied())
            .collect();
        pending[i] = internal.len();
        for dependency in internal {
            dependents.entry(dependency).or_default().push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..jobs.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(jobs.len());

    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &dependent in dependents.get(&i).map(Vec::as_slice).unwrap_or_default() {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < jobs.len() {
        let cycle = (0..jobs.len())
            .filter(|&i| pending[i] > 0)
            .map(|i| jobs[i].name.clone())
            .collect();
        return Err(CatalogError::DependencyCycle(cycle));
    }

    Ok(order)
}
