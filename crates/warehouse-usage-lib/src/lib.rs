pub mod calculator;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod loader;
pub mod monitor;
pub mod pricing;
pub mod units;
pub mod window;

pub use calculator::{QueryAggregator, StorageAggregator};
pub use config::{RateSettings, Settings};
pub use data_structures::{
    DatasetUsageEntry, DatasetUsageFact, QueryJobFact, QuerySummary, StorageSummary,
    UsageReport, UserQueryEntry,
};
pub use error::{UsageError, UsageResult};
pub use loader::{SnapshotSource, StaticSource, UsageSource};
pub use monitor::UsageMonitor;
pub use pricing::CostRateModel;
pub use window::QueryWindow;

pub use anyhow::Result;
pub use chrono::{DateTime, Duration, Utc};
pub use rust_decimal::Decimal;

pub mod prelude {
    pub use crate::data_structures::{DatasetUsageFact, QueryJobFact, UsageReport};
    pub use crate::monitor::UsageMonitor;
    pub use crate::pricing::CostRateModel;
    pub use anyhow::Result;
}
