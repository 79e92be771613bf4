//! Payroll claim arithmetic over plaintext cycle metadata.
//!
//! Nothing here is authoritative: the ledger decides what is actually paid.

use crate::core::clock::Clock;
use crate::error::{Result, SdkError};
use crate::types::{ClaimState, EmployeeRecord};
use num_bigint::BigUint;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Cadence of [`ClaimTicker`]
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Seconds until the next pay boundary, floored at zero
pub fn time_left(cycle_seconds: u64, last_claim_at: u64, now: u64) -> u64 {
    last_claim_at
        .saturating_add(cycle_seconds)
        .saturating_sub(now)
}

/// Whole cycles since the last claim; 0 when either input is missing or zero
pub fn periods_elapsed(cycle_seconds: Option<u64>, last_claim_at: Option<u64>, now: u64) -> u64 {
    match (cycle_seconds, last_claim_at) {
        (Some(cycle), Some(last)) if cycle > 0 && last > 0 => now.saturating_sub(last) / cycle,
        _ => 0,
    }
}

/// `per_period * periods`, or `None` ("undetermined") when the per-period value
/// is unknown or nothing has accrued
pub fn claimable_amount(per_period_clear: Option<&BigUint>, periods_elapsed: u64) -> Option<BigUint> {
    match per_period_clear {
        Some(per_period) if periods_elapsed > 0 => Some(per_period * BigUint::from(periods_elapsed)),
        _ => None,
    }
}

/// Unix instant of the next pay boundary
pub fn next_payday_instant(last_claim_at: Option<u64>, cycle_seconds: Option<u64>) -> Option<u64> {
    match (last_claim_at, cycle_seconds) {
        (Some(last), Some(cycle)) if last > 0 && cycle > 0 => last.checked_add(cycle),
        _ => None,
    }
}

/// Parse a decrypted plaintext (decimal string) into an amount
pub fn parse_clear_amount(clear: &str) -> Result<BigUint> {
    let trimmed = clear.trim();
    trimmed
        .parse::<BigUint>()
        .map_err(|e| SdkError::Decryption(format!("plaintext {trimmed:?} is not an amount: {e}")))
}

impl ClaimState {
    pub fn compute(
        cycle_seconds: Option<u64>,
        last_claim_at: Option<u64>,
        per_period_clear: Option<&BigUint>,
        now: u64,
    ) -> Self {
        let periods = periods_elapsed(cycle_seconds, last_claim_at, now);
        let time_left_seconds = match (cycle_seconds, last_claim_at) {
            (Some(cycle), Some(last)) if cycle > 0 && last > 0 => Some(time_left(cycle, last, now)),
            _ => None,
        };
        Self {
            time_left_seconds,
            periods_elapsed: periods,
            claimable_amount: claimable_amount(per_period_clear, periods),
        }
    }

    pub fn from_record(record: &EmployeeRecord, per_period_clear: Option<&BigUint>, now: u64) -> Self {
        Self::compute(
            Some(record.cycle_seconds),
            Some(record.last_claim_at),
            per_period_clear,
            now,
        )
    }

    /// The next boundary has passed and something can be claimed
    pub fn is_claimable(&self) -> bool {
        self.time_left_seconds == Some(0) && self.claimable_amount.is_some()
    }
}

fn poll_interval() -> Interval {
    let mut ticks = interval(POLL_INTERVAL);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticks
}

/// Recomputes a [`ClaimState`] once per [`POLL_INTERVAL`]
pub struct ClaimTicker {
    cycle_seconds: u64,
    last_claim_at: u64,
    per_period_clear: Option<BigUint>,
    clock: Arc<dyn Clock>,
    /// Created on the first tick, inside the runtime driving it
    interval: Option<Interval>,
}

impl ClaimTicker {
    /// `None` unless both cycle length and last claim are known
    pub fn new(
        cycle_seconds: Option<u64>,
        last_claim_at: Option<u64>,
        per_period_clear: Option<BigUint>,
        clock: Arc<dyn Clock>,
    ) -> Option<Self> {
        let cycle_seconds = cycle_seconds.filter(|c| *c > 0)?;
        let last_claim_at = last_claim_at.filter(|t| *t > 0)?;
        Some(Self {
            cycle_seconds,
            last_claim_at,
            per_period_clear,
            clock,
            interval: None,
        })
    }

    pub fn set_per_period_clear(&mut self, value: Option<BigUint>) {
        self.per_period_clear = value;
    }

    /// Wait for the next tick and recompute
    pub async fn tick(&mut self) -> ClaimState {
        self.interval.get_or_insert_with(poll_interval).tick().await;
        ClaimState::compute(
            Some(self.cycle_seconds),
            Some(self.last_claim_at),
            self.per_period_clear.as_ref(),
            self.clock.now_unix(),
        )
    }
}
