use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Spanish month abbreviations as printed on CFE statements, January first.
const MONTHS_ES: [&str; 12] = [
    "ENE", "FEB", "MAR", "ABR", "MAY", "JUN", "JUL", "AGO", "SEP", "OCT", "NOV", "DIC",
];
const MONTHS_EN: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Map a three-letter month abbreviation (Spanish or English, any case) to 1–12.
pub fn month_from_abbr(abbr: &str) -> Option<u32> {
    let upper = abbr.trim().to_uppercase();
    MONTHS_ES
        .iter()
        .position(|m| *m == upper)
        .or_else(|| MONTHS_EN.iter().position(|m| *m == upper))
        .map(|i| i as u32 + 1)
}

/// Render a date the way the bill prints it: `DD/MMM/YYYY` with the Spanish month.
pub fn format_bill_date(date: NaiveDate) -> String {
    format!(
        "{:02}/{}/{}",
        date.day(),
        MONTHS_ES[date.month0() as usize],
        date.year()
    )
}

/// Parse a single date token.
///
/// Accepts `DD/MMM/YYYY` and `DD-MMM-YYYY` with a month abbreviation, plus the
/// numeric forms `DD/MM/YYYY`, `DD-MM-YYYY`, `YYYY-MM-DD`, `DD/MM/YY`, `DD-MM-YY`.
/// Returns `None` for anything that is not a real calendar date.
pub fn parse_bill_date(token: &str) -> Option<NaiveDate> {
    let token = token.trim();
    let parts: Vec<&str> = token.split(['/', '-']).collect();
    if parts.len() != 3 {
        return None;
    }

    if parts[0].len() == 4 {
        let y: i32 = parts[0].parse().ok()?;
        let m: u32 = parts[1].parse().ok()?;
        let d: u32 = parts[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }

    let day: u32 = parts[0].parse().ok()?;
    let month = match parts[1].parse::<u32>() {
        Ok(m) => m,
        Err(_) => month_from_abbr(parts[1])?,
    };
    let year = match parts[2].len() {
        4 => parts[2].parse::<i32>().ok()?,
        2 => 2000 + parts[2].parse::<i32>().ok()?,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn re_range_separator() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)\s+(?:-|al|a)\s+").expect("invalid regex"))
}

/// A billing period with inclusive start and end dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", format_bill_date(self.start), format_bill_date(self.end))
    }
}

impl BillingPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        BillingPeriod { start, end }
    }

    /// Parse `"<date> - <date>"`, `"<date> AL <date>"` or `"<date> A <date>"`.
    ///
    /// The dash separator needs surrounding whitespace so it is not confused
    /// with dashes inside `DD-MM-YYYY` dates. The end must fall after the start.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = re_range_separator().splitn(text.trim(), 2);
        let start = parse_bill_date(parts.next()?)?;
        let end = parse_bill_date(parts.next()?)?;
        (end > start).then_some(BillingPeriod { start, end })
    }

    /// Days elapsed from start to end, as CFE counts a billing cycle.
    pub fn days(self) -> i64 {
        (self.end - self.start).num_days()
    }
}
