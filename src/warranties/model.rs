use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::lifecycle::{self, LifecycleError, WarrantyStatus};

/// A tracked product as stored in `warranties`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Warranty {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub brand: String,
    pub category: String,
    #[serde(with = "super::iso_date")]
    pub purchase_date: Date,
    pub warranty_months: i32,
    pub price: f64,
    #[serde(with = "super::iso_date::option")]
    pub expiry_date: Option<Date>, // NULL for legacy rows only
    pub receipt_number: Option<String>,
    #[serde(skip_serializing)]
    pub receipt_key: Option<String>,
    #[serde(skip_serializing)]
    pub image_key: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Warranty {
    pub fn status(&self, today: Date) -> Option<WarrantyStatus> {
        lifecycle::classify_opt(self.expiry_date, today)
    }

    pub fn days_remaining(&self, today: Date) -> Option<i64> {
        self.expiry_date
            .map(|expiry| lifecycle::days_remaining(expiry, today))
    }
}

/// Validated user input for a create or a full update.
#[derive(Debug, Clone, PartialEq)]
pub struct WarrantyDraft {
    pub name: String,
    pub brand: String,
    pub category: String,
    pub purchase_date: Date,
    pub warranty_months: i32,
    pub price: f64,
    pub receipt_number: Option<String>,
}

impl WarrantyDraft {
    /// Expiry derived from purchase date and duration only.
    pub fn expiry_date(&self) -> Result<Date, LifecycleError> {
        lifecycle::expiry_date(self.purchase_date, self.warranty_months)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn warranty(price: f64, months: i32, expiry: Option<Date>) -> Warranty {
        let now = OffsetDateTime::now_utc();
        Warranty {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: "Blender".into(),
            brand: "Acme".into(),
            category: "Kitchen Appliances".into(),
            purchase_date: time::macros::date!(2024 - 01 - 01),
            warranty_months: months,
            price,
            expiry_date: expiry,
            receipt_number: None,
            receipt_key: None,
            image_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn named(name: &str, brand: &str, category: &str) -> Warranty {
        Warranty {
            name: name.into(),
            brand: brand.into(),
            category: category.into(),
            ..warranty(10.0, 12, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn draft() -> WarrantyDraft {
        WarrantyDraft {
            name: "Laptop".into(),
            brand: "Lenovo".into(),
            category: "Electronics".into(),
            purchase_date: date!(2025 - 01 - 01),
            warranty_months: 1,
            price: 999.0,
            receipt_number: Some("R-1".into()),
        }
    }

    #[test]
    fn editing_price_keeps_expiry() {
        let before = draft();
        let after = WarrantyDraft {
            price: 1299.0,
            ..before.clone()
        };
        assert_eq!(before.expiry_date(), after.expiry_date());
        assert_eq!(after.expiry_date(), Ok(date!(2025 - 01 - 31)));
    }

    #[test]
    fn editing_duration_moves_expiry() {
        let before = draft();
        let after = WarrantyDraft {
            warranty_months: 2,
            ..before.clone()
        };
        assert_eq!(after.expiry_date(), Ok(date!(2025 - 03 - 02)));
        assert_ne!(before.expiry_date(), after.expiry_date());
    }

    #[test]
    fn serializes_dates_and_hides_storage_keys() {
        let mut w = fixtures::warranty(50.0, 12, Some(date!(2025 - 12 - 27)));
        w.receipt_key = Some("warranties/secret/receipt.pdf".into());
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["purchase_date"], "2024-01-01");
        assert_eq!(json["expiry_date"], "2025-12-27");
        assert!(json.get("receipt_key").is_none());
        assert!(json.get("image_key").is_none());
    }

    #[test]
    fn missing_expiry_has_no_status_or_countdown() {
        let w = fixtures::warranty(50.0, 12, None);
        assert_eq!(w.status(date!(2025 - 01 - 01)), None);
        assert_eq!(w.days_remaining(date!(2025 - 01 - 01)), None);
    }
}
