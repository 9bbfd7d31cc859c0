use std::collections::{BTreeMap, BTreeSet};

use cfebill_core::{BillField, Confidence, FieldCandidate};
use serde::{Deserialize, Serialize};

/// The proposal handed to the human validator.
///
/// On success `fields` holds every field (empty ones with `Confidence::None`)
/// and `warnings` lists the empty ones. On failure `fields` is empty and
/// `error_message` says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub success: bool,
    pub fields: BTreeMap<BillField, FieldCandidate>,
    pub warnings: BTreeSet<BillField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ExtractionOutcome {
    pub fn get(&self, field: BillField) -> Option<&FieldCandidate> {
        self.fields.get(&field)
    }

    /// Candidates that actually carry a value, in display order.
    pub fn populated(&self) -> impl Iterator<Item = &FieldCandidate> {
        self.fields.values().filter(|c| !c.is_empty())
    }

    pub fn found_count(&self) -> usize {
        self.populated().count()
    }

    /// Every value found is low confidence. Still a success; the validator
    /// just has more to check.
    pub fn all_low_confidence(&self) -> bool {
        self.found_count() > 0 && self.populated().all(|c| c.confidence <= Confidence::Low)
    }
}
