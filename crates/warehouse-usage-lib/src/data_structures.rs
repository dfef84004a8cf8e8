use crate::error::{UsageError, UsageResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stored bytes for one dataset, as reported by the metering source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetUsageFact {
    dataset_id: String,
    size_bytes: i64,
}

impl DatasetUsageFact {
    pub fn new(dataset_id: impl Into<String>, size_bytes: i64) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            size_bytes,
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn size_bytes(&self) -> i64 {
        self.size_bytes
    }
}

/// Bytes processed by one query job, attributed to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryJobFact {
    user_email: String,
    bytes_processed: i64,
}

impl QueryJobFact {
    pub fn new(user_email: impl Into<String>, bytes_processed: i64) -> Self {
        Self {
            user_email: user_email.into(),
            bytes_processed,
        }
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    pub fn bytes_processed(&self) -> i64 {
        self.bytes_processed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetUsageEntry {
    dataset_id: String,
    size_bytes: u64,
    #[serde(with = "rust_decimal::serde::float")]
    size_gb: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    size_tb: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    cost_usd: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    cost_local: Decimal,
}

impl DatasetUsageEntry {
    pub fn new(
        dataset_id: String,
        size_bytes: u64,
        size_gb: Decimal,
        size_tb: Decimal,
        cost_usd: Decimal,
        cost_local: Decimal,
    ) -> Self {
        Self {
            dataset_id,
            size_bytes,
            size_gb,
            size_tb,
            cost_usd,
            cost_local,
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn size_gb(&self) -> Decimal {
        self.size_gb
    }

    pub fn size_tb(&self) -> Decimal {
        self.size_tb
    }

    pub fn cost_usd(&self) -> Decimal {
        self.cost_usd
    }

    pub fn cost_local(&self) -> Decimal {
        self.cost_local
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserQueryEntry {
    user_email: String,
    bytes_processed: u64,
    #[serde(with = "rust_decimal::serde::float")]
    tb_processed: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    cost_usd: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    cost_local: Decimal,
}

impl UserQueryEntry {
    pub fn new(
        user_email: String,
        bytes_processed: u64,
        tb_processed: Decimal,
        cost_usd: Decimal,
        cost_local: Decimal,
    ) -> Self {
        Self {
            user_email,
            bytes_processed,
            tb_processed,
            cost_usd,
            cost_local,
        }
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    pub fn tb_processed(&self) -> Decimal {
        self.tb_processed
    }

    pub fn cost_usd(&self) -> Decimal {
        self.cost_usd
    }

    pub fn cost_local(&self) -> Decimal {
        self.cost_local
    }
}

/// Running sums over a section's entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionTotals {
    bytes: u64,
    cost_usd: Decimal,
    cost_local: Decimal,
}

impl SectionTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, bytes: u64, cost_usd: Decimal, cost_local: Decimal) -> UsageResult<()> {
        self.bytes = self.bytes.checked_add(bytes).ok_or_else(|| {
            UsageError::invalid_fact("section total", "summed byte count overflows")
        })?;
        self.cost_usd = self.cost_usd.checked_add(cost_usd).ok_or_else(|| {
            UsageError::invalid_fact("section total", "summed USD cost overflows")
        })?;
        self.cost_local = self.cost_local.checked_add(cost_local).ok_or_else(|| {
            UsageError::invalid_fact("section total", "summed local cost overflows")
        })?;
        Ok(())
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn cost_usd(&self) -> Decimal {
        self.cost_usd
    }

    pub fn cost_local(&self) -> Decimal {
        self.cost_local
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageSummary {
    datasets: Vec<DatasetUsageEntry>,
    total_size_bytes: u64,
    #[serde(with = "rust_decimal::serde::float")]
    total_cost_usd: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    total_cost_local: Decimal,
}

impl StorageSummary {
    pub fn new(datasets: Vec<DatasetUsageEntry>, totals: SectionTotals) -> Self {
        Self {
            datasets,
            total_size_bytes: totals.bytes(),
            total_cost_usd: totals.cost_usd(),
            total_cost_local: totals.cost_local(),
        }
    }

    pub fn datasets(&self) -> &[DatasetUsageEntry] {
        &self.datasets
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.total_size_bytes
    }

    pub fn total_cost_usd(&self) -> Decimal {
        self.total_cost_usd
    }

    pub fn total_cost_local(&self) -> Decimal {
        self.total_cost_local
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuerySummary {
    users: Vec<UserQueryEntry>,
    total_bytes_processed: u64,
    #[serde(with = "rust_decimal::serde::float")]
    total_cost_usd: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    total_cost_local: Decimal,
}

impl QuerySummary {
    pub fn new(users: Vec<UserQueryEntry>, totals: SectionTotals) -> Self {
        Self {
            users,
            total_bytes_processed: totals.bytes(),
            total_cost_usd: totals.cost_usd(),
            total_cost_local: totals.cost_local(),
        }
    }

    pub fn users(&self) -> &[UserQueryEntry] {
        &self.users
    }

    pub fn total_bytes_processed(&self) -> u64 {
        self.total_bytes_processed
    }

    pub fn total_cost_usd(&self) -> Decimal {
        self.total_cost_usd
    }

    pub fn total_cost_local(&self) -> Decimal {
        self.total_cost_local
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// The combined storage and query cost report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    storage: StorageSummary,
    query: QuerySummary,
}

impl UsageReport {
    pub fn new(storage: StorageSummary, query: QuerySummary) -> Self {
        Self { storage, query }
    }

    pub fn storage(&self) -> &StorageSummary {
        &self.storage
    }

    pub fn query(&self) -> &QuerySummary {
        &self.query
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
