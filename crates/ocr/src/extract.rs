use std::collections::BTreeMap;
use std::sync::OnceLock;

use cfebill_core::{
    format_bill_date, normalize_tariff_code, parse_bill_date, BillField, BillingPeriod,
    Confidence, Mxn,
};
use regex::Regex;

use crate::score;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        pub(crate) fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_tariff,
    r"(?i)\bTARIFA\b[\s:.#\-]{0,5}(\d[A-Z]?|DAC)\b");
// Digits must not continue a longer number such as "1,234" or "12.5".
re!(re_consumption,
    r"(?i)(?:^|[^\w,.])(\d{1,4})\s?kWh\b");
// Upper-case label only: "Total periodo" heads the consumption table.
re!(re_total,
    r"(?s)\bTOTAL\b.*?(\d{1,3}(?:,\d{3})+\.\d{2}|\d+\.\d{2})\b");
re!(re_period,
    r"(?i)\b(\d{1,2}/[A-Z]{3}/\d{4}|\d{1,2}-[A-Z]{3}-\d{4})\b");
re!(re_period_end,
    r"(?i)^\s+(?:-|al|a)\s+(\d{1,2}/[A-Z]{3}/\d{4}|\d{1,2}-[A-Z]{3}-\d{4})\b");
re!(re_reading_previous,
    r"(?i)\bLECTURA\s+ANTERIOR\b\D*(\d+)");
re!(re_reading_current,
    r"(?i)\bLECTURA\s+ACTUAL\b\D*(\d+)");

// ── Rule table ───────────────────────────────────────────────────────────────

/// How one field is found in OCR text and how much its candidate is trusted.
pub struct FieldRule {
    pub field: BillField,
    /// Returns the normalized candidate, or `None` when the field is absent.
    pub matcher: fn(&str) -> Option<String>,
    /// `(candidate, full text) -> tier`. Only called for non-empty candidates.
    pub scorer: fn(&str, &str) -> Confidence,
}

/// One rule per field, in `BillField::ALL` order.
pub static RULES: [FieldRule; 6] = [
    FieldRule {
        field: BillField::Tariff,
        matcher: match_tariff,
        scorer: score::tariff,
    },
    FieldRule {
        field: BillField::ConsumptionKwh,
        matcher: match_consumption,
        scorer: score::consumption,
    },
    FieldRule {
        field: BillField::TotalMxn,
        matcher: match_total,
        scorer: score::amount,
    },
    FieldRule {
        field: BillField::Period,
        matcher: match_period,
        scorer: score::period,
    },
    FieldRule {
        field: BillField::ReadingPrevious,
        matcher: match_reading_previous,
        scorer: score::meter_reading,
    },
    FieldRule {
        field: BillField::ReadingCurrent,
        matcher: match_reading_current,
        scorer: score::meter_reading,
    },
];

pub fn rule_for(field: BillField) -> &'static FieldRule {
    &RULES[field as usize]
}

// ── Public parsing API ───────────────────────────────────────────────────────

pub struct FieldParser;

impl FieldParser {
    /// Run every rule over `text`. The result always has all six fields;
    /// a field that was not found maps to an empty string.
    pub fn parse(text: &str) -> BTreeMap<BillField, String> {
        RULES
            .iter()
            .map(|rule| (rule.field, (rule.matcher)(text).unwrap_or_default()))
            .collect()
    }
}

// ── Matchers ─────────────────────────────────────────────────────────────────

fn match_tariff(text: &str) -> Option<String> {
    let c = re_tariff().captures(text)?;
    Some(normalize_tariff_code(c.get(1)?.as_str()))
}

fn match_consumption(text: &str) -> Option<String> {
    let c = re_consumption().captures(text)?;
    Some(strip_leading_zeros(c.get(1)?.as_str()))
}

fn match_total(text: &str) -> Option<String> {
    let c = re_total().captures(text)?;
    Mxn::parse(c.get(1)?.as_str()).map(Mxn::to_plain)
}

/// First token that is a real calendar date; impossible dates are skipped.
/// When it opens a range (`<date> - <date>`, `<date> AL <date>`) ending on a
/// later date, the whole period is kept as `DD/MMM/YYYY - DD/MMM/YYYY`.
fn match_period(text: &str) -> Option<String> {
    re_period().find_iter(text).find_map(|m| {
        let start = parse_bill_date(m.as_str())?;
        let end = re_period_end()
            .captures(&text[m.end()..])
            .and_then(|c| parse_bill_date(c.get(1)?.as_str()))
            .filter(|end| *end > start);
        Some(match end {
            Some(end) => BillingPeriod::new(start, end).to_string(),
            None => format_bill_date(start),
        })
    })
}

fn match_reading_previous(text: &str) -> Option<String> {
    let c = re_reading_previous().captures(text)?;
    Some(strip_leading_zeros(c.get(1)?.as_str()))
}

fn match_reading_current(text: &str) -> Option<String> {
    let c = re_reading_current().captures(text)?;
    Some(strip_leading_zeros(c.get(1)?.as_str()))
}

/// Meter displays pad with zeros (`"012345"`); form inputs are plain integers.
fn strip_leading_zeros(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
