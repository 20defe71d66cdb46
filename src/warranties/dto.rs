use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use super::filter::WarrantyFilter;
use super::lifecycle::WarrantyStatus;
use super::model::{Warranty, WarrantyDraft};
use crate::error::ApiError;

/// Body for create and full update.
#[derive(Debug, Clone, Deserialize)]
pub struct WarrantyRequest {
    pub name: String,
    pub brand: String,
    pub category: String,
    #[serde(with = "super::iso_date")]
    pub purchase_date: Date,
    pub warranty_months: i32,
    pub price: f64,
    #[serde(default)]
    pub receipt_number: Option<String>,
}

impl WarrantyRequest {
    /// Form-level checks; the returned draft is safe to derive expiry from.
    pub fn validate(self) -> Result<WarrantyDraft, ApiError> {
        let name = required_text("name", &self.name)?;
        let brand = required_text("brand", &self.brand)?;
        let category = required_text("category", &self.category)?;

        if self.warranty_months < 0 {
            return Err(ApiError::validation("warranty_months must be 0 or greater"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ApiError::validation("price must be a non-negative number"));
        }

        let receipt_number = self
            .receipt_number
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        Ok(WarrantyDraft {
            name,
            brand,
            category,
            purchase_date: self.purchase_date,
            warranty_months: self.warranty_months,
            price: self.price,
            receipt_number,
        })
    }
}

fn required_text(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, with = "super::iso_date::option")]
    pub today: Option<Date>,
}

impl ListQuery {
    pub fn filter(&self) -> WarrantyFilter {
        WarrantyFilter {
            q: self.q.clone(),
            category: self.category.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TodayQuery {
    #[serde(default, with = "super::iso_date::option")]
    pub today: Option<Date>,
}

/// Reference date for derived fields: explicit override or current UTC day.
pub fn reference_date(today: Option<Date>) -> Date {
    today.unwrap_or_else(|| OffsetDateTime::now_utc().date())
}

/// A record plus the status fields derived for `today`.
#[derive(Debug, Serialize)]
pub struct WarrantyView {
    #[serde(flatten)]
    pub warranty: Warranty,
    pub status: Option<WarrantyStatus>,
    pub days_remaining: Option<i64>,
    pub has_receipt_file: bool,
    pub has_image: bool,
}

impl WarrantyView {
    pub fn new(warranty: Warranty, today: Date) -> Self {
        Self {
            status: warranty.status(today),
            days_remaining: warranty.days_remaining(today),
            has_receipt_file: warranty.receipt_key.is_some(),
            has_image: warranty.image_key.is_some(),
            warranty,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WarrantyList {
    pub items: Vec<WarrantyView>,
    pub categories: Vec<String>,
}
