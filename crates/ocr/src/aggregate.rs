use std::collections::{BTreeMap, BTreeSet};

use cfebill_core::{BillField, FieldCandidate};

use crate::classify::ErrorCode;
use crate::extract::FieldParser;
use crate::score;
use crate::types::ExtractionOutcome;

/// Parse, score and aggregate raw OCR text in one step.
pub fn extract_outcome(text: &str) -> ExtractionOutcome {
    aggregate(&FieldParser::parse(text), text)
}

/// Combine parser candidates with their confidence tiers.
///
/// Any single non-empty field makes the outcome a success, whatever its tier.
pub fn aggregate(candidates: &BTreeMap<BillField, String>, text: &str) -> ExtractionOutcome {
    let mut fields = BTreeMap::new();
    let mut warnings = BTreeSet::new();

    for field in BillField::ALL {
        let value = candidates.get(&field).map(|v| v.trim()).unwrap_or("");
        if value.is_empty() {
            warnings.insert(field);
            fields.insert(field, FieldCandidate::empty(field));
        } else {
            let confidence = score::score(field, value, text);
            fields.insert(field, FieldCandidate::new(field, value, confidence));
        }
    }

    if warnings.len() == BillField::ALL.len() {
        return ExtractionOutcome {
            success: false,
            fields: BTreeMap::new(),
            warnings,
            error_message: Some(ErrorCode::NoCfeData.message().to_string()),
        };
    }

    ExtractionOutcome { success: true, fields, warnings, error_message: None }
}
