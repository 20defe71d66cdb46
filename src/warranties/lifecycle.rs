//! Warranty lifecycle: expiry derivation and status classification.
//!
//! Everything here is pure. Callers pass the reference date explicitly so the
//! same record and the same `today` always classify the same way.

use serde::{Deserialize, Serialize};
use time::{Date, Duration};

/// Days counted per warranty month. Expiry uses this fixed multiplier, not
/// calendar months.
pub const DAYS_PER_MONTH: i64 = 30;

/// Upper bound (inclusive) of the expiring-soon window, in days.
pub const EXPIRING_SOON_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("warranty duration must not be negative (got {0} months)")]
    NegativeDuration(i32),
    #[error("expiry date is out of the supported calendar range")]
    DateOutOfRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarrantyStatus {
    Active,
    ExpiringSoon,
    Expired,
}

/// `purchase_date + months * 30` days.
pub fn expiry_date(purchase_date: Date, months: i32) -> Result<Date, LifecycleError> {
    if months < 0 {
        return Err(LifecycleError::NegativeDuration(months));
    }
    purchase_date
        .checked_add(Duration::days(i64::from(months) * DAYS_PER_MONTH))
        .ok_or(LifecycleError::DateOutOfRange)
}

/// Whole days from `today` until `expiry` (negative once expired).
pub fn days_remaining(expiry: Date, today: Date) -> i64 {
    (expiry - today).whole_days()
}

pub fn classify(expiry: Date, today: Date) -> WarrantyStatus {
    let remaining = days_remaining(expiry, today);
    if remaining < 0 {
        WarrantyStatus::Expired
    } else if remaining <= EXPIRING_SOON_DAYS {
        WarrantyStatus::ExpiringSoon
    } else {
        WarrantyStatus::Active
    }
}

/// Classification for a record whose expiry may be unknown; `None` means
/// the record cannot be placed in any bucket.
pub fn classify_opt(expiry: Option<Date>, today: Date) -> Option<WarrantyStatus> {
    expiry.map(|e| classify(e, today))
}
