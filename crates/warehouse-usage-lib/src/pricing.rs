use crate::config::RateSettings;
use crate::error::{UsageError, UsageResult};
use crate::units::round_quantity;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

pub const DEFAULT_STORAGE_USD_PER_GB: f64 = 0.02; // monthly
pub const DEFAULT_QUERY_USD_PER_TB: f64 = 6.0;
pub const DEFAULT_USD_TO_LOCAL: f64 = 150.0;

/// Fixed cost rates for one report run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostRateModel {
    storage_usd_per_gb: Decimal,
    query_usd_per_tb: Decimal,
    usd_to_local: Decimal,
}

impl CostRateModel {
    pub fn new(
        storage_usd_per_gb: f64,
        query_usd_per_tb: f64,
        usd_to_local: f64,
    ) -> UsageResult<Self> {
        Ok(Self {
            storage_usd_per_gb: validate_rate("storage_usd_per_gb", storage_usd_per_gb)?,
            query_usd_per_tb: validate_rate("query_usd_per_tb", query_usd_per_tb)?,
            usd_to_local: validate_rate("usd_to_local", usd_to_local)?,
        })
    }

    pub fn from_settings(settings: &RateSettings) -> UsageResult<Self> {
        let storage = require("storage_usd_per_gb", settings.storage_usd_per_gb)?;
        let query = require("query_usd_per_tb", settings.query_usd_per_tb)?;
        let multiplier = require("usd_to_local", settings.usd_to_local)?;
        Self::new(storage, query, multiplier)
    }

    pub fn storage_usd_per_gb(&self) -> Decimal {
        self.storage_usd_per_gb
    }

    pub fn query_usd_per_tb(&self) -> Decimal {
        self.query_usd_per_tb
    }

    pub fn usd_to_local(&self) -> Decimal {
        self.usd_to_local
    }

    pub fn storage_cost_usd(&self, gb: Decimal) -> UsageResult<Decimal> {
        apply_rate("storage_usd_per_gb", gb, self.storage_usd_per_gb)
    }

    pub fn query_cost_usd(&self, tb: Decimal) -> UsageResult<Decimal> {
        apply_rate("query_usd_per_tb", tb, self.query_usd_per_tb)
    }

    pub fn to_local_currency(&self, usd: Decimal) -> UsageResult<Decimal> {
        apply_rate("usd_to_local", usd, self.usd_to_local)
    }
}

fn apply_rate(field: &'static str, quantity: Decimal, rate: Decimal) -> UsageResult<Decimal> {
    quantity
        .checked_mul(rate)
        .map(round_quantity)
        .ok_or_else(|| {
            UsageError::invalid_rate(field, format!("{} x {} overflows", quantity, rate))
        })
}

impl Default for CostRateModel {
    fn default() -> Self {
        Self {
            storage_usd_per_gb: Decimal::new(2, 2),
            query_usd_per_tb: Decimal::new(6, 0),
            usd_to_local: Decimal::new(150, 0),
        }
    }
}

fn require(field: &'static str, value: Option<f64>) -> UsageResult<f64> {
    value.ok_or_else(|| UsageError::invalid_rate(field, "rate is missing"))
}

fn validate_rate(field: &'static str, value: f64) -> UsageResult<Decimal> {
    if !value.is_finite() {
        return Err(UsageError::invalid_rate(field, format!("{} is not a number", value)));
    }
    if value < 0.0 {
        return Err(UsageError::invalid_rate(field, format!("{} is negative", value)));
    }
    Decimal::from_f64(value)
        .ok_or_else(|| UsageError::invalid_rate(field, format!("{} cannot be represented", value)))
}
