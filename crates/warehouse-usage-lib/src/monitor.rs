use crate::calculator::{QueryAggregator, StorageAggregator};
use crate::data_structures::{DatasetUsageFact, QueryJobFact, UsageReport};
use crate::error::{UsageError, UsageResult};
use crate::loader::UsageSource;
use crate::pricing::CostRateModel;
use crate::window::QueryWindow;
use anyhow::Result;
use rust_decimal::Decimal;
use tracing::{debug, error};

/// Builds the combined cost report for one run.
pub struct UsageMonitor {
    rates: CostRateModel,
    storage_aggregator: StorageAggregator,
    query_aggregator: QueryAggregator,
}

impl UsageMonitor {
    pub fn new(rates: CostRateModel) -> Self {
        Self {
            rates,
            storage_aggregator: StorageAggregator::new(),
            query_aggregator: QueryAggregator::new(),
        }
    }

    pub fn rates(&self) -> &CostRateModel {
        &self.rates
    }

    pub fn generate_report(
        &self,
        storage_facts: &[DatasetUsageFact],
        query_facts: &[QueryJobFact],
    ) -> UsageResult<UsageReport> {
        let storage = self.storage_aggregator.aggregate(storage_facts, &self.rates)?;
        let query = self.query_aggregator.aggregate(query_facts, &self.rates)?;

        let report = UsageReport::new(storage, query);
        Self::verify(&report)
            .inspect_err(|e| error!(error = %e, "Report failed integrity check"))?;

        debug!(
            datasets = report.storage().datasets().len(),
            users = report.query().users().len(),
            "Generated usage report"
        );
        Ok(report)
    }

    /// Pulls facts through `source` and builds the report from them.
    pub fn report_from_source(
        &self,
        source: &dyn UsageSource,
        datasets: &[String],
        window: &QueryWindow,
    ) -> Result<UsageReport> {
        let storage_facts = source.dataset_usage(datasets)?;
        let query_facts = source.query_jobs(window)?;
        Ok(self.generate_report(&storage_facts, &query_facts)?)
    }

    /// Checks that every section total equals the sum of its entries.
    pub fn verify(report: &UsageReport) -> UsageResult<()> {
        let storage = report.storage();
        let datasets = storage.datasets();
        check(
            "storage",
            "total_size_bytes",
            storage.total_size_bytes(),
            datasets.iter().map(|e| e.size_bytes()).sum(),
        )?;
        check(
            "storage",
            "total_cost_usd",
            storage.total_cost_usd(),
            datasets.iter().map(|e| e.cost_usd()).sum::<Decimal>(),
        )?;
        check(
            "storage",
            "total_cost_local",
            storage.total_cost_local(),
            datasets.iter().map(|e| e.cost_local()).sum::<Decimal>(),
        )?;

        let query = report.query();
        let users = query.users();
        check(
            "query",
            "total_bytes_processed",
            query.total_bytes_processed(),
            users.iter().map(|e| e.bytes_processed()).sum(),
        )?;
        check(
            "query",
            "total_cost_usd",
            query.total_cost_usd(),
            users.iter().map(|e| e.cost_usd()).sum::<Decimal>(),
        )?;
        check(
            "query",
            "total_cost_local",
            query.total_cost_local(),
            users.iter().map(|e| e.cost_local()).sum::<Decimal>(),
        )
    }
}

fn check<T: PartialEq>(
    section: &'static str,
    field: &'static str,
    reported: T,
    summed: T,
) -> UsageResult<()> {
    if reported == summed {
        Ok(())
    } else {
        Err(UsageError::ReportInconsistency { section, field })
    }
}

impl Default for UsageMonitor {
    fn default() -> Self {
        Self::new(CostRateModel::default())
    }
}
