use serde::Serialize;
use time::Date;

use super::lifecycle::WarrantyStatus;
use super::model::Warranty;

/// Dashboard figures for one user's records relative to a reference date.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    #[serde(with = "super::iso_date")]
    pub today: Date,
    pub total: usize,
    pub active: usize,
    pub expiring_soon: usize,
    pub expired: usize,
    /// Records with no expiry date; counted in `total` only.
    pub unknown: usize,
    pub total_value: f64,
    pub avg_warranty_months: f64,
    pub max_value: f64,
    pub expiring_soon_items: Vec<Warranty>,
    pub expired_items: Vec<Warranty>,
}

/// Single pass reduction over `records`. Empty input yields zeroed figures.
pub fn summarize(records: &[Warranty], today: Date) -> PortfolioSummary {
    let mut summary = PortfolioSummary {
        today,
        total: records.len(),
        active: 0,
        expiring_soon: 0,
        expired: 0,
        unknown: 0,
        total_value: 0.0,
        avg_warranty_months: 0.0,
        max_value: 0.0,
        expiring_soon_items: Vec::new(),
        expired_items: Vec::new(),
    };

    let mut months_sum: i64 = 0;
    let mut months_count: usize = 0;
    let mut max_value: Option<f64> = None;

    for record in records {
        match record.status(today) {
            Some(WarrantyStatus::Active) => summary.active += 1,
            Some(WarrantyStatus::ExpiringSoon) => {
                summary.expiring_soon += 1;
                summary.expiring_soon_items.push(record.clone());
            }
            Some(WarrantyStatus::Expired) => {
                summary.expired += 1;
                summary.expired_items.push(record.clone());
            }
            None => summary.unknown += 1,
        }

        summary.total_value += record.price;
        max_value = Some(max_value.map_or(record.price, |m| m.max(record.price)));

        // a zero-month warranty counts as "no warranty" for the average
        if record.warranty_months > 0 {
            months_sum += i64::from(record.warranty_months);
            months_count += 1;
        }
    }

    if months_count > 0 {
        summary.avg_warranty_months = months_sum as f64 / months_count as f64;
    }
    summary.max_value = max_value.unwrap_or(0.0);
    summary
}
