use crate::data_structures::{
    DatasetUsageEntry, DatasetUsageFact, QueryJobFact, QuerySummary, SectionTotals,
    StorageSummary, UserQueryEntry,
};
use crate::error::{UsageError, UsageResult};
use crate::pricing::CostRateModel;
use crate::units::{bytes_to_gb, bytes_to_tb, checked_bytes};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Turns per-dataset stored bytes into the storage section.
pub struct StorageAggregator;

impl StorageAggregator {
    pub fn new() -> Self {
        Self
    }

    /// One entry per fact, in input order. Duplicate dataset ids are kept apart.
    pub fn aggregate(
        &self,
        facts: &[DatasetUsageFact],
        rates: &CostRateModel,
    ) -> UsageResult<StorageSummary> {
        let mut entries = Vec::with_capacity(facts.len());
        let mut totals = SectionTotals::new();

        for fact in facts {
            let entry = self.calculate_entry(fact, rates).inspect_err(|e| {
                warn!(dataset_id = fact.dataset_id(), error = %e, "Rejecting storage facts");
            })?;
            totals.add(entry.size_bytes(), entry.cost_usd(), entry.cost_local())?;
            entries.push(entry);
        }

        debug!(
            datasets = entries.len(),
            total_size_bytes = totals.bytes(),
            "Aggregated storage usage"
        );
        Ok(StorageSummary::new(entries, totals))
    }

    fn calculate_entry(
        &self,
        fact: &DatasetUsageFact,
        rates: &CostRateModel,
    ) -> UsageResult<DatasetUsageEntry> {
        let size_bytes = checked_bytes(fact.dataset_id(), fact.size_bytes())?;
        let size_gb = bytes_to_gb(fact.size_bytes())?;
        let size_tb = bytes_to_tb(fact.size_bytes())?;
        let cost_usd = rates.storage_cost_usd(size_gb)?;
        let cost_local = rates.to_local_currency(cost_usd)?;

        Ok(DatasetUsageEntry::new(
            fact.dataset_id().to_string(),
            size_bytes,
            size_gb,
            size_tb,
            cost_usd,
            cost_local,
        ))
    }
}

impl Default for StorageAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Groups query jobs by user and prices the bytes each user processed.
pub struct QueryAggregator;

impl QueryAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Entries are ordered by bytes processed descending, then user id ascending.
    pub fn aggregate(
        &self,
        facts: &[QueryJobFact],
        rates: &CostRateModel,
    ) -> UsageResult<QuerySummary> {
        let grouped = self.group_by_user(facts).inspect_err(|e| {
            warn!(error = %e, "Rejecting query job facts");
        })?;

        let mut entries = grouped
            .into_iter()
            .map(|(user_email, bytes)| self.calculate_entry(user_email, bytes, rates))
            .collect::<UsageResult<Vec<_>>>()?;

        entries.sort_by(|a, b| {
            b.bytes_processed()
                .cmp(&a.bytes_processed())
                .then_with(|| a.user_email().cmp(b.user_email()))
        });

        let mut totals = SectionTotals::new();
        for entry in &entries {
            totals.add(entry.bytes_processed(), entry.cost_usd(), entry.cost_local())?;
        }

        debug!(
            jobs = facts.len(),
            users = entries.len(),
            total_bytes_processed = totals.bytes(),
            "Aggregated query usage"
        );
        Ok(QuerySummary::new(entries, totals))
    }

    fn group_by_user<'a>(&self, facts: &'a [QueryJobFact]) -> UsageResult<BTreeMap<&'a str, u64>> {
        let mut grouped: BTreeMap<&str, u64> = BTreeMap::new();

        for fact in facts {
            let bytes = checked_bytes(fact.user_email(), fact.bytes_processed())?;
            let sum = grouped.entry(fact.user_email()).or_insert(0);
            *sum = sum.checked_add(bytes).ok_or_else(|| {
                UsageError::invalid_fact(fact.user_email(), "summed byte count overflows")
            })?;
        }

        Ok(grouped)
    }

    fn calculate_entry(
        &self,
        user_email: &str,
        bytes_processed: u64,
        rates: &CostRateModel,
    ) -> UsageResult<UserQueryEntry> {
        let signed = i64::try_from(bytes_processed).map_err(|_| {
            UsageError::invalid_fact(user_email, "summed byte count overflows")
        })?;
        let tb_processed = bytes_to_tb(signed)?;
        let cost_usd = rates.query_cost_usd(tb_processed)?;
        let cost_local = rates.to_local_currency(cost_usd)?;

        Ok(UserQueryEntry::new(
            user_email.to_string(),
            bytes_processed,
            tb_processed,
            cost_usd,
            cost_local,
        ))
    }
}

impl Default for QueryAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const GIB: i64 = 1 << 30;

    fn rates() -> CostRateModel {
        CostRateModel::new(0.02, 6.0, 150.0).unwrap()
    }

    #[test]
    fn test_single_dataset() {
        let aggregator = StorageAggregator::new();
        let summary = aggregator
            .aggregate(&[DatasetUsageFact::new("ds1", GIB)], &rates())
            .unwrap();

        let entry = &summary.datasets()[0];
        assert_eq!(entry.dataset_id(), "ds1");
        assert_eq!(entry.size_bytes(), 1_073_741_824);
        assert_eq!(entry.size_gb(), dec!(1.0));
        assert_eq!(entry.size_tb(), dec!(0.001));
        assert_eq!(entry.cost_usd(), dec!(0.02));
        assert_eq!(entry.cost_local(), dec!(3.0));

        assert_eq!(summary.total_size_bytes(), 1_073_741_824);
        assert_eq!(summary.total_cost_usd(), dec!(0.02));
        assert_eq!(summary.total_cost_local(), dec!(3.0));
    }

    #[test]
    fn test_storage_keeps_input_order_and_duplicates() {
        let aggregator = StorageAggregator::new();
        let facts = vec![
            DatasetUsageFact::new("zeta", 3 * GIB),
            DatasetUsageFact::new("alpha", GIB),
            DatasetUsageFact::new("zeta", 2 * GIB),
        ];
        let summary = aggregator.aggregate(&facts, &rates()).unwrap();

        let ids: Vec<&str> = summary.datasets().iter().map(|e| e.dataset_id()).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "zeta"]);
        assert_eq!(summary.total_size_bytes(), 6 * GIB as u64);
        assert_eq!(summary.total_cost_usd(), dec!(0.12));
        assert_eq!(summary.total_cost_local(), dec!(18.0));
    }

    #[test]
    fn test_storage_totals_are_sums_of_entries() {
        let aggregator = StorageAggregator::new();
        // Each entry rounds on its own; the total must not be reconverted from bytes.
        let facts = vec![
            DatasetUsageFact::new("a", 123_456_789),
            DatasetUsageFact::new("b", 987_654_321),
            DatasetUsageFact::new("c", 55_555_555_555),
        ];
        let summary = aggregator.aggregate(&facts, &rates()).unwrap();

        let usd: Decimal = summary.datasets().iter().map(|e| e.cost_usd()).sum();
        let local: Decimal = summary.datasets().iter().map(|e| e.cost_local()).sum();
        let bytes: u64 = summary.datasets().iter().map(|e| e.size_bytes()).sum();
        assert_eq!(summary.total_cost_usd(), usd);
        assert_eq!(summary.total_cost_local(), local);
        assert_eq!(summary.total_size_bytes(), bytes);
    }

    #[test]
    fn test_empty_storage() {
        let summary = StorageAggregator::new().aggregate(&[], &rates()).unwrap();
        assert!(summary.is_empty());
        assert_eq!(summary.total_size_bytes(), 0);
        assert_eq!(summary.total_cost_usd(), Decimal::ZERO);
        assert_eq!(summary.total_cost_local(), Decimal::ZERO);
    }

    #[test]
    fn test_negative_storage_fails_fast() {
        let facts = vec![
            DatasetUsageFact::new("ok", GIB),
            DatasetUsageFact::new("broken", -5),
        ];
        let err = StorageAggregator::new().aggregate(&facts, &rates()).unwrap_err();
        assert_eq!(
            err,
            UsageError::InvalidUsageFact {
                subject: "broken".to_string(),
                reason: "byte count -5 is negative".to_string(),
            }
        );
    }

    #[test]
    fn test_tied_users_ordered_by_email() {
        let facts = vec![
            QueryJobFact::new("b@x.com", 536_870_912),
            QueryJobFact::new("a@x.com", 536_870_912),
        ];
        let summary = QueryAggregator::new().aggregate(&facts, &rates()).unwrap();

        let users = summary.users();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].user_email(), "a@x.com");
        assert_eq!(users[1].user_email(), "b@x.com");
        for user in users {
            assert_eq!(user.bytes_processed(), 536_870_912);
            assert_eq!(user.tb_processed(), dec!(0.0005));
        }
        assert_eq!(summary.total_bytes_processed(), 1_073_741_824);
    }

    #[test]
    fn test_groups_and_sorts_by_bytes() {
        let facts = vec![
            QueryJobFact::new("small@x.com", 10),
            QueryJobFact::new("big@x.com", 1 << 40),
            QueryJobFact::new("small@x.com", 20),
            QueryJobFact::new("big@x.com", 1 << 40),
            QueryJobFact::new("mid@x.com", GIB),
        ];
        let summary = QueryAggregator::new().aggregate(&facts, &rates()).unwrap();

        let users: Vec<(&str, u64)> = summary
            .users()
            .iter()
            .map(|u| (u.user_email(), u.bytes_processed()))
            .collect();
        assert_eq!(
            users,
            vec![
                ("big@x.com", 2 << 40),
                ("mid@x.com", 1 << 30),
                ("small@x.com", 30),
            ]
        );

        let big = &summary.users()[0];
        assert_eq!(big.tb_processed(), dec!(2));
        assert_eq!(big.cost_usd(), dec!(12));
        assert_eq!(big.cost_local(), dec!(1800));
    }

    #[test]
    fn test_grouping_is_case_sensitive() {
        let facts = vec![
            QueryJobFact::new("User@x.com", 100),
            QueryJobFact::new("user@x.com", 100),
        ];
        let summary = QueryAggregator::new().aggregate(&facts, &rates()).unwrap();
        assert_eq!(summary.users().len(), 2);
        assert_eq!(summary.users()[0].user_email(), "User@x.com");
    }

    #[test]
    fn test_grouping_ignores_input_order() {
        let facts = vec![
            QueryJobFact::new("a@x.com", 5),
            QueryJobFact::new("b@x.com", 7),
            QueryJobFact::new("a@x.com", 2),
        ];
        let mut reversed = facts.clone();
        reversed.reverse();

        let aggregator = QueryAggregator::new();
        assert_eq!(
            aggregator.aggregate(&facts, &rates()).unwrap(),
            aggregator.aggregate(&reversed, &rates()).unwrap()
        );
    }

    #[test]
    fn test_zero_byte_user_is_kept() {
        let facts = vec![
            QueryJobFact::new("idle@x.com", 0),
            QueryJobFact::new("busy@x.com", GIB),
        ];
        let summary = QueryAggregator::new().aggregate(&facts, &rates()).unwrap();

        let idle = &summary.users()[1];
        assert_eq!(idle.user_email(), "idle@x.com");
        assert_eq!(idle.bytes_processed(), 0);
        assert_eq!(idle.cost_usd(), Decimal::ZERO);
    }

    #[test]
    fn test_empty_queries() {
        let summary = QueryAggregator::new().aggregate(&[], &rates()).unwrap();
        assert!(summary.is_empty());
        assert_eq!(summary.total_bytes_processed(), 0);
        assert_eq!(summary.total_cost_usd(), Decimal::ZERO);
        assert_eq!(summary.total_cost_local(), Decimal::ZERO);
    }

    #[test]
    fn test_negative_query_fails_fast() {
        let facts = vec![
            QueryJobFact::new("a@x.com", 100),
            QueryJobFact::new("b@x.com", -1),
        ];
        assert!(matches!(
            QueryAggregator::new().aggregate(&facts, &rates()),
            Err(UsageError::InvalidUsageFact { subject, .. }) if subject == "b@x.com"
        ));
    }

    #[test]
    fn test_user_sum_overflow_rejected() {
        let facts = vec![
            QueryJobFact::new("a@x.com", i64::MAX),
            QueryJobFact::new("a@x.com", i64::MAX),
        ];
        assert!(matches!(
            QueryAggregator::new().aggregate(&facts, &rates()),
            Err(UsageError::InvalidUsageFact { .. })
        ));
    }
}
