use std::collections::BTreeMap;

use cfebill_core::{BillField, BillForm, FieldCandidate};
use cfebill_ocr::ExtractionOutcome;
use serde::Serialize;

/// Staging area for one extraction proposal. Edits live here until applied;
/// the form is never touched by an edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationSession {
    outcome: ExtractionOutcome,
    edits: BTreeMap<BillField, String>,
}

impl ValidationSession {
    pub fn new(outcome: ExtractionOutcome) -> Self {
        Self { outcome, edits: BTreeMap::new() }
    }

    pub fn outcome(&self) -> &ExtractionOutcome {
        &self.outcome
    }

    pub fn candidate(&self, field: BillField) -> Option<&FieldCandidate> {
        self.outcome.get(field)
    }

    /// Record a user edit. An empty string clears the proposed value.
    pub fn edit(&mut self, field: BillField, value: impl Into<String>) {
        self.edits.insert(field, value.into());
    }

    pub fn is_edited(&self, field: BillField) -> bool {
        self.edits
            .get(&field)
            .is_some_and(|v| Some(v.as_str()) != self.candidate(field).map(|c| c.value.as_str()))
    }

    /// The value the user currently sees: their edit, else the proposal.
    pub fn current_value(&self, field: BillField) -> &str {
        self.edits
            .get(&field)
            .map(String::as_str)
            .or_else(|| self.candidate(field).map(|c| c.value.as_str()))
            .unwrap_or("")
    }

    /// Current values for every field, empty ones included.
    pub fn reviewed_values(&self) -> BTreeMap<BillField, String> {
        BillField::ALL
            .into_iter()
            .map(|f| (f, self.current_value(f).to_string()))
            .collect()
    }

    /// Merge the reviewed values into the form. Returns the fields written.
    pub fn apply_to(&self, form: &mut BillForm) -> std::collections::BTreeSet<BillField> {
        form.apply(&self.reviewed_values())
    }
}
