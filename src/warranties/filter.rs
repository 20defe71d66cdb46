use std::collections::BTreeSet;

use serde::Deserialize;

use super::model::Warranty;

/// List filter built from query parameters. Blank values are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarrantyFilter {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl WarrantyFilter {
    pub fn matches(&self, record: &Warranty) -> bool {
        self.matches_text(record) && self.matches_category(record)
    }

    /// Case-insensitive substring over name, brand or category.
    pub fn matches_text(&self, record: &Warranty) -> bool {
        let Some(needle) = non_blank(&self.q) else {
            return true;
        };
        let needle = needle.to_lowercase();
        [&record.name, &record.brand, &record.category]
            .into_iter()
            .any(|field| contains_ci(field, &needle))
    }

    pub fn matches_category(&self, record: &Warranty) -> bool {
        match non_blank(&self.category) {
            Some(category) => record.category == category,
            None => true,
        }
    }

    pub fn apply(&self, records: Vec<Warranty>) -> Vec<Warranty> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn contains_ci(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowered_needle)
}

/// Sorted, de-duplicated categories used by the list filter dropdown.
pub fn distinct_categories(records: &[Warranty]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
