use crate::data_structures::{DatasetUsageFact, QueryJobFact};
use crate::error::UsageError;
use crate::window::QueryWindow;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Something that can hand over raw metering facts.
pub trait UsageSource {
    /// Stored bytes for each requested dataset, in the requested order.
    /// Datasets the source knows nothing about report zero bytes.
    fn dataset_usage(&self, datasets: &[String]) -> Result<Vec<DatasetUsageFact>>;

    /// Query jobs that ran inside `window`.
    fn query_jobs(&self, window: &QueryWindow) -> Result<Vec<QueryJobFact>>;
}

/// Serves fixed facts. Storage facts are picked per requested dataset;
/// query jobs are returned regardless of the window.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    storage: Vec<DatasetUsageFact>,
    queries: Vec<QueryJobFact>,
}

impl StaticSource {
    pub fn new(storage: Vec<DatasetUsageFact>, queries: Vec<QueryJobFact>) -> Self {
        Self { storage, queries }
    }
}

impl UsageSource for StaticSource {
    fn dataset_usage(&self, datasets: &[String]) -> Result<Vec<DatasetUsageFact>> {
        let mut facts = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            let before = facts.len();
            facts.extend(
                self.storage
                    .iter()
                    .filter(|fact| fact.dataset_id() == dataset)
                    .cloned(),
            );
            if facts.len() == before {
                facts.push(DatasetUsageFact::new(dataset.as_str(), 0));
            }
        }
        Ok(facts)
    }

    fn query_jobs(&self, _window: &QueryWindow) -> Result<Vec<QueryJobFact>> {
        Ok(self.queries.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TableRow {
    dataset_id: String,
    num_bytes: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct JobRow {
    user_email: Option<String>,
    total_bytes_processed: Option<i64>,
    creation_time: DateTime<Utc>,
    job_type: String,
    state: String,
}

impl JobRow {
    fn is_finished_query(&self) -> bool {
        self.job_type == "QUERY" && self.state == "DONE"
    }
}

/// Reads JSONL exports of table metadata and the jobs view.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    tables_path: PathBuf,
    jobs_path: PathBuf,
}

impl SnapshotSource {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(tables_path: P, jobs_path: Q) -> Self {
        Self {
            tables_path: tables_path.as_ref().to_path_buf(),
            jobs_path: jobs_path.as_ref().to_path_buf(),
        }
    }

    fn load_rows<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;

        let reader = BufReader::new(file);
        let mut rows = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;

            if line.trim().is_empty() {
                continue;
            }

            let row = serde_json::from_str(&line).with_context(|| {
                format!("Failed to parse line {} of {}", line_num + 1, path.display())
            })?;
            rows.push(row);
        }

        Ok(rows)
    }
}

impl UsageSource for SnapshotSource {
    fn dataset_usage(&self, datasets: &[String]) -> Result<Vec<DatasetUsageFact>> {
        let rows: Vec<TableRow> = self.load_rows(&self.tables_path)?;
        let mut sizes: HashMap<&str, i64> = HashMap::new();

        for row in &rows {
            // Tables without a reported size contribute nothing.
            let Some(num_bytes) = row.num_bytes else {
                continue;
            };
            if num_bytes < 0 {
                return Err(UsageError::invalid_fact(
                    row.dataset_id.as_str(),
                    format!("byte count {} is negative", num_bytes),
                )
                .into());
            }
            let size = sizes.entry(row.dataset_id.as_str()).or_insert(0);
            *size = size.checked_add(num_bytes).ok_or_else(|| {
                UsageError::invalid_fact(row.dataset_id.as_str(), "summed byte count overflows")
            })?;
        }

        debug!(
            tables = rows.len(),
            datasets = datasets.len(),
            "Loaded table snapshot"
        );

        Ok(datasets
            .iter()
            .map(|dataset| {
                let size = sizes.get(dataset.as_str()).copied().unwrap_or(0);
                DatasetUsageFact::new(dataset.as_str(), size)
            })
            .collect())
    }

    fn query_jobs(&self, window: &QueryWindow) -> Result<Vec<QueryJobFact>> {
        let rows: Vec<JobRow> = self.load_rows(&self.jobs_path)?;
        let total = rows.len();

        let facts: Vec<QueryJobFact> = rows
            .into_iter()
            .filter(|row| row.is_finished_query() && window.contains(row.creation_time))
            .filter_map(|row| match (row.user_email, row.total_bytes_processed) {
                (Some(user_email), Some(bytes)) => Some(QueryJobFact::new(user_email, bytes)),
                _ => None,
            })
            .collect();

        debug!(jobs = total, kept = facts.len(), "Loaded jobs snapshot");
        Ok(facts)
    }
}
