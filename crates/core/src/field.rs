use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of bill fields the extractor knows about.
///
/// Variant order is the canonical display order; `Ord` follows it so that
/// ordered maps keyed by `BillField` iterate in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillField {
    Tariff,
    ConsumptionKwh,
    TotalMxn,
    Period,
    ReadingPrevious,
    ReadingCurrent,
}

impl BillField {
    pub const ALL: [BillField; 6] = [
        BillField::Tariff,
        BillField::ConsumptionKwh,
        BillField::TotalMxn,
        BillField::Period,
        BillField::ReadingPrevious,
        BillField::ReadingCurrent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BillField::Tariff => "tariff",
            BillField::ConsumptionKwh => "consumption_kwh",
            BillField::TotalMxn => "total_mxn",
            BillField::Period => "period",
            BillField::ReadingPrevious => "reading_previous",
            BillField::ReadingCurrent => "reading_current",
        }
    }
}

impl fmt::Display for BillField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BillField {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BillField::ALL
            .into_iter()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown bill field: '{s}'"))
    }
}

/// Coarse reliability label shown next to each proposed value.
///
/// The ordering is only used for display styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::None => write!(f, "none"),
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

/// One proposed value for a bill field. An empty `value` means nothing was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCandidate {
    pub field: BillField,
    pub value: String,
    pub confidence: Confidence,
}

impl FieldCandidate {
    pub fn new(field: BillField, value: impl Into<String>, confidence: Confidence) -> Self {
        Self { field, value: value.into(), confidence }
    }

    pub fn empty(field: BillField) -> Self {
        Self::new(field, String::new(), Confidence::None)
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}
