use serde::{Deserialize, Serialize};
use std::fmt;

/// Residential CFE tariff classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tariff {
    #[serde(rename = "1")]
    T1,
    #[serde(rename = "1A")]
    T1A,
    #[serde(rename = "1B")]
    T1B,
    #[serde(rename = "1C")]
    T1C,
    #[serde(rename = "1D")]
    T1D,
    #[serde(rename = "1E")]
    T1E,
    #[serde(rename = "1F")]
    T1F,
    #[serde(rename = "DAC")]
    Dac,
}

impl Tariff {
    pub const ALL: [Tariff; 8] = [
        Tariff::T1,
        Tariff::T1A,
        Tariff::T1B,
        Tariff::T1C,
        Tariff::T1D,
        Tariff::T1E,
        Tariff::T1F,
        Tariff::Dac,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Tariff::T1 => "1",
            Tariff::T1A => "1A",
            Tariff::T1B => "1B",
            Tariff::T1C => "1C",
            Tariff::T1D => "1D",
            Tariff::T1E => "1E",
            Tariff::T1F => "1F",
            Tariff::Dac => "DAC",
        }
    }
}

/// Uppercase and strip a leading `TARIFA` label, e.g. `"tarifa 1c"` → `"1C"`.
pub fn normalize_tariff_code(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let rest = upper.strip_prefix("TARIFA").unwrap_or(&upper);
    rest.trim_start_matches(|c: char| c.is_whitespace() || c == ':')
        .trim_end()
        .to_string()
}

impl fmt::Display for Tariff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Tariff {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = normalize_tariff_code(s);
        Tariff::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or_else(|| format!("Unknown tariff code: '{s}'"))
    }
}
