//! Rule-based confidence tiers. Every function here is pure.

use std::str::FromStr;

use cfebill_core::{BillField, Confidence, Tariff};

use crate::extract::{re_consumption, rule_for};

/// Tier for one candidate. Empty candidates are always `None`.
pub fn score(field: BillField, candidate: &str, text: &str) -> Confidence {
    if candidate.is_empty() {
        return Confidence::None;
    }
    (rule_for(field).scorer)(candidate, text)
}

/// Closed set of tariff codes → high, anything else the label pointed at → low.
pub fn tariff(candidate: &str, _text: &str) -> Confidence {
    if Tariff::from_str(candidate).is_ok() {
        Confidence::High
    } else {
        Confidence::Low
    }
}

/// Unambiguous only if the text has a single `<n> kWh` reading; bills with
/// per-tier breakdowns repeat the unit.
pub fn consumption(_candidate: &str, text: &str) -> Confidence {
    match re_consumption().find_iter(text).count() {
        1 => Confidence::High,
        _ => Confidence::Medium,
    }
}

/// Bills print several money totals (subtotals, subsidy, previous balance).
pub fn amount(_candidate: &str, _text: &str) -> Confidence {
    Confidence::Medium
}

pub fn period(_candidate: &str, _text: &str) -> Confidence {
    Confidence::Medium
}

/// Digit recognition on meter readings is the least reliable OCR case.
pub fn meter_reading(_candidate: &str, _text: &str) -> Confidence {
    Confidence::Low
}
