use crate::error::{UsageError, UsageResult};
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for every quantity and cost surfaced in a report.
pub const REPORT_PRECISION: u32 = 4;

pub const BYTES_PER_GB: u64 = 1 << 30;
pub const BYTES_PER_TB: u64 = 1 << 40;

/// Rounds to [`REPORT_PRECISION`] places, ties to even.
pub fn round_quantity(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(REPORT_PRECISION, RoundingStrategy::MidpointNearestEven)
}

pub fn bytes_to_gb(bytes: i64) -> UsageResult<Decimal> {
    convert(bytes, BYTES_PER_GB)
}

pub fn bytes_to_tb(bytes: i64) -> UsageResult<Decimal> {
    convert(bytes, BYTES_PER_TB)
}

/// Validates a raw byte count and returns it unsigned.
pub fn checked_bytes(subject: &str, bytes: i64) -> UsageResult<u64> {
    u64::try_from(bytes).map_err(|_| {
        UsageError::invalid_fact(subject, format!("byte count {} is negative", bytes))
    })
}

fn convert(bytes: i64, divisor: u64) -> UsageResult<Decimal> {
    let bytes = checked_bytes("byte count", bytes)?;
    Ok(round_quantity(Decimal::from(bytes) / Decimal::from(divisor)))
}
