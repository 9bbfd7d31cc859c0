use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An amount in Mexican pesos, held at two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Mxn(Decimal);

impl Mxn {
    pub fn from_decimal(decimal: Decimal) -> Self {
        Mxn(decimal.round_dp(2))
    }

    /// Parse an amount as printed on a bill: `"$1,234.56"`, `"1234.56"`, `" 99.00 "`.
    pub fn parse(s: &str) -> Option<Self> {
        let clean: String = s
            .trim()
            .trim_start_matches('$')
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();
        if clean.is_empty() {
            return None;
        }
        Decimal::from_str(&clean).ok().map(Mxn::from_decimal)
    }

    /// Plain form for numeric form inputs: no currency sign, no separators.
    pub fn to_plain(self) -> String {
        format!("{:.2}", self.0)
    }
}

impl fmt::Display for Mxn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}
