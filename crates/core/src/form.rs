use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::field::BillField;
use crate::period::{parse_bill_date, BillingPeriod};

/// The authoritative bill entry form the user fills in.
///
/// OCR proposals only reach it through [`BillForm::apply`]; everything else is
/// manual entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillForm {
    values: BTreeMap<BillField, String>,
    /// Fields written by the most recent apply, for "modified" styling.
    modified: BTreeSet<BillField>,
}

impl BillForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: BillField) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or("")
    }

    /// Manual entry. Clears the modified mark for that field.
    pub fn set(&mut self, field: BillField, value: impl Into<String>) {
        self.values.insert(field, value.into());
        self.modified.remove(&field);
    }

    /// Copy every non-empty value into the form and mark it modified.
    /// Empty (or whitespace-only) values leave the existing form value alone.
    /// Returns the fields that were written.
    pub fn apply(&mut self, values: &BTreeMap<BillField, String>) -> BTreeSet<BillField> {
        let mut written = BTreeSet::new();
        for (field, value) in values {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            self.values.insert(*field, value.to_string());
            written.insert(*field);
        }
        self.modified = written.clone();
        written
    }

    pub fn is_modified(&self, field: BillField) -> bool {
        self.modified.contains(&field)
    }

    pub fn modified(&self) -> &BTreeSet<BillField> {
        &self.modified
    }

    /// Interpret the period field as either a full range or a single date
    /// (treated as a one-day period).
    pub fn billing_period(&self) -> Option<BillingPeriod> {
        let raw = self.get(BillField::Period);
        BillingPeriod::parse(raw)
            .or_else(|| parse_bill_date(raw).map(|d| BillingPeriod::new(d, d)))
    }
}
