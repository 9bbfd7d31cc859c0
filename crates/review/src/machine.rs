use std::collections::BTreeSet;
use std::time::Duration;

use cfebill_core::{BillField, BillForm};
use cfebill_ocr::{
    BillPipeline, ClassifiedError, ErrorCode, ExtractionOutcome, OcrBackend, UploadedArtifact,
};
use serde::Serialize;
use thiserror::Error;

use crate::session::ValidationSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Idle,
    Uploading,
    Processing,
    Validation,
    Error,
    Applied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Upload,
    Accepted,
    Succeeded,
    Failed,
    Edit,
    Apply,
    Discard,
    Retry,
}

/// Every legal `(from, event) -> to`. Anything else is rejected.
pub static TRANSITIONS: &[(StateKind, EventKind, StateKind)] = &[
    (StateKind::Idle, EventKind::Upload, StateKind::Uploading),
    (StateKind::Validation, EventKind::Upload, StateKind::Uploading),
    (StateKind::Error, EventKind::Upload, StateKind::Uploading),
    (StateKind::Applied, EventKind::Upload, StateKind::Uploading),
    (StateKind::Uploading, EventKind::Accepted, StateKind::Processing),
    (StateKind::Uploading, EventKind::Failed, StateKind::Error),
    (StateKind::Processing, EventKind::Succeeded, StateKind::Validation),
    (StateKind::Processing, EventKind::Failed, StateKind::Error),
    (StateKind::Validation, EventKind::Edit, StateKind::Validation),
    (StateKind::Validation, EventKind::Apply, StateKind::Applied),
    (StateKind::Validation, EventKind::Discard, StateKind::Idle),
    (StateKind::Error, EventKind::Retry, StateKind::Idle),
];

pub fn target(from: StateKind, event: EventKind) -> Option<StateKind> {
    TRANSITIONS
        .iter()
        .find(|(f, e, _)| *f == from && *e == event)
        .map(|(_, _, to)| *to)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReviewState {
    #[default]
    Idle,
    Uploading,
    Processing,
    Validation { session: ValidationSession },
    Error { error: ClassifiedError },
    Applied { written: BTreeSet<BillField> },
}

impl ReviewState {
    pub fn kind(&self) -> StateKind {
        match self {
            ReviewState::Idle => StateKind::Idle,
            ReviewState::Uploading => StateKind::Uploading,
            ReviewState::Processing => StateKind::Processing,
            ReviewState::Validation { .. } => StateKind::Validation,
            ReviewState::Error { .. } => StateKind::Error,
            ReviewState::Applied { .. } => StateKind::Applied,
        }
    }

    /// The upload surface is suspended while a document is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, ReviewState::Uploading | ReviewState::Processing)
    }
}

#[derive(Debug, Clone)]
pub enum ReviewEvent {
    Upload,
    Accepted,
    Succeeded(ExtractionOutcome),
    Failed(ClassifiedError),
    Edit { field: BillField, value: String },
    Apply,
    Discard,
    Retry,
}

impl ReviewEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ReviewEvent::Upload => EventKind::Upload,
            ReviewEvent::Accepted => EventKind::Accepted,
            ReviewEvent::Succeeded(_) => EventKind::Succeeded,
            ReviewEvent::Failed(_) => EventKind::Failed,
            ReviewEvent::Edit { .. } => EventKind::Edit,
            ReviewEvent::Apply => EventKind::Apply,
            ReviewEvent::Discard => EventKind::Discard,
            ReviewEvent::Retry => EventKind::Retry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Event {event:?} is not allowed in state {state:?}")]
    Illegal { state: StateKind, event: EventKind },
    #[error("Error '{0}' cannot be retried; choose a file instead")]
    NotRetryable(ErrorCode),
}

/// Drives one interaction context from upload to apply or discard.
///
/// The form is only written by the `Apply` event.
#[derive(Debug, Clone, Default)]
pub struct ReviewMachine {
    state: ReviewState,
    trail: Vec<StateKind>,
}

impl ReviewMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ReviewState {
        &self.state
    }

    /// States entered since the most recent `Upload`, in order.
    pub fn trail(&self) -> &[StateKind] {
        &self.trail
    }

    pub fn session(&self) -> Option<&ValidationSession> {
        match &self.state {
            ReviewState::Validation { session } => Some(session),
            _ => None,
        }
    }

    /// Apply one event. On rejection the state is left as it was.
    pub fn handle(
        &mut self,
        event: ReviewEvent,
        form: &mut BillForm,
    ) -> Result<StateKind, TransitionError> {
        // An outcome with nothing in it is a classified failure, not a proposal.
        let event = match event {
            ReviewEvent::Succeeded(outcome) if !outcome.success => {
                ReviewEvent::Failed(ClassifiedError::from(ErrorCode::NoCfeData))
            }
            other => other,
        };

        let from = self.state.kind();
        let to = target(from, event.kind())
            .ok_or(TransitionError::Illegal { state: from, event: event.kind() })?;

        if let (ReviewState::Error { error }, EventKind::Retry) = (&self.state, event.kind()) {
            if !error.can_retry {
                return Err(TransitionError::NotRetryable(error.code));
            }
        }

        let event_kind = event.kind();
        let next = match event {
            ReviewEvent::Upload => ReviewState::Uploading,
            ReviewEvent::Accepted => ReviewState::Processing,
            ReviewEvent::Succeeded(outcome) => ReviewState::Validation {
                session: ValidationSession::new(outcome),
            },
            ReviewEvent::Failed(error) => ReviewState::Error { error },
            ReviewEvent::Edit { field, value } => {
                if let ReviewState::Validation { session } = &mut self.state {
                    session.edit(field, value);
                }
                return Ok(to);
            }
            ReviewEvent::Apply => {
                let ReviewState::Validation { session } = &self.state else {
                    return Err(TransitionError::Illegal { state: from, event: EventKind::Apply });
                };
                ReviewState::Applied { written: session.apply_to(form) }
            }
            ReviewEvent::Discard | ReviewEvent::Retry => ReviewState::Idle,
        };

        tracing::debug!(from = ?from, to = ?to, "Review state transition");
        if event_kind == EventKind::Upload {
            self.trail.clear();
        }
        self.trail.push(to);
        self.state = next;
        Ok(to)
    }

    /// Run one upload through the pipeline.
    ///
    /// `Upload`, then the cheap gate (presence, media type, size). A rejected
    /// file goes straight from `Uploading` to `Error`; only an accepted one
    /// moves to `Processing` and on to `Succeeded` or `Failed`.
    pub async fn submit<R: OcrBackend + 'static>(
        &mut self,
        pipeline: &BillPipeline<R>,
        artifact: Option<UploadedArtifact>,
        timeout: Duration,
        form: &mut BillForm,
    ) -> Result<StateKind, TransitionError> {
        self.handle(ReviewEvent::Upload, form)?;

        if let Err(err) = pipeline.accept(artifact.as_ref()) {
            let error = ClassifiedError::from(&err);
            tracing::warn!(code = error.code.as_str(), "Upload rejected: {err}");
            let to = self.handle(ReviewEvent::Failed(error), form)?;
            tracing::debug!(trail = ?self.trail, "Upload finished");
            return Ok(to);
        }
        self.handle(ReviewEvent::Accepted, form)?;

        let event = match pipeline.submit(artifact, timeout).await {
            Ok(outcome) => ReviewEvent::Succeeded(outcome),
            Err(error) => ReviewEvent::Failed(error),
        };
        let to = self.handle(event, form)?;
        tracing::debug!(trail = ?self.trail, "Upload finished");
        Ok(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfebill_ocr::extract_outcome;

    fn in_validation(text: &str) -> (ReviewMachine, BillForm) {
        let mut m = ReviewMachine::new();
        let mut form = BillForm::new();
        m.handle(ReviewEvent::Upload, &mut form).unwrap();
        m.handle(ReviewEvent::Accepted, &mut form).unwrap();
        m.handle(ReviewEvent::Succeeded(extract_outcome(text)), &mut form).unwrap();
        (m, form)
    }

    fn in_error(code: ErrorCode) -> (ReviewMachine, BillForm) {
        let mut m = ReviewMachine::new();
        let mut form = BillForm::new();
        m.handle(ReviewEvent::Upload, &mut form).unwrap();
        m.handle(ReviewEvent::Failed(code.into()), &mut form).unwrap();
        (m, form)
    }

    #[test]
    fn table_has_no_duplicate_pairs() {
        for (i, (f, e, _)) in TRANSITIONS.iter().enumerate() {
            assert!(
                TRANSITIONS[i + 1..].iter().all(|(f2, e2, _)| (f2, e2) != (f, e)),
                "duplicate {f:?}/{e:?}"
            );
        }
    }

    #[test]
    fn starts_idle_and_not_busy() {
        let m = ReviewMachine::new();
        assert_eq!(m.state().kind(), StateKind::Idle);
        assert!(!m.state().is_busy());
        assert!(m.session().is_none());
    }

    #[test]
    fn upload_and_processing_are_busy() {
        let mut m = ReviewMachine::new();
        let mut form = BillForm::new();
        m.handle(ReviewEvent::Upload, &mut form).unwrap();
        assert!(m.state().is_busy());
        m.handle(ReviewEvent::Accepted, &mut form).unwrap();
        assert_eq!(m.state().kind(), StateKind::Processing);
        assert!(m.state().is_busy());
    }

    #[test]
    fn success_enters_validation_with_outcome() {
        let (m, form) = in_validation("TARIFA 1C");
        assert_eq!(m.state().kind(), StateKind::Validation);
        assert_eq!(m.session().unwrap().current_value(BillField::Tariff), "1C");
        assert_eq!(form, BillForm::new());
    }

    #[test]
    fn unsuccessful_outcome_becomes_no_cfe_data_error() {
        let (m, _) = in_validation("nothing useful here");
        match m.state() {
            ReviewState::Error { error } => {
                assert_eq!(error.code, ErrorCode::NoCfeData);
                assert!(error.can_retry);
            }
            other => panic!("expected error state, got {other:?}"),
        }
    }

    #[test]
    fn edits_never_touch_the_form() {
        let (mut m, mut form) = in_validation("TARIFA 1C");
        let edit = ReviewEvent::Edit { field: BillField::Tariff, value: "DAC".into() };
        assert_eq!(m.handle(edit, &mut form).unwrap(), StateKind::Validation);
        assert_eq!(form.get(BillField::Tariff), "");
        assert_eq!(m.session().unwrap().current_value(BillField::Tariff), "DAC");
    }

    #[test]
    fn apply_writes_edited_values() {
        let (mut m, mut form) = in_validation("TARIFA 1C\nTOTAL $450.00");
        m.handle(ReviewEvent::Edit { field: BillField::Tariff, value: "DAC".into() }, &mut form)
            .unwrap();
        m.handle(ReviewEvent::Apply, &mut form).unwrap();

        assert_eq!(form.get(BillField::Tariff), "DAC");
        assert_eq!(form.get(BillField::TotalMxn), "450.00");
        assert!(form.is_modified(BillField::Tariff));
        match m.state() {
            ReviewState::Applied { written } => {
                assert_eq!(*written, BTreeSet::from([BillField::Tariff, BillField::TotalMxn]));
            }
            other => panic!("expected applied, got {other:?}"),
        }
    }

    #[test]
    fn discard_restores_idle_and_leaves_form_alone() {
        let (mut m, mut form) = in_validation("TARIFA 1C");
        form.set(BillField::Tariff, "1A");
        let before = form.clone();

        m.handle(ReviewEvent::Discard, &mut form).unwrap();
        assert_eq!(m.state(), &ReviewState::Idle);
        assert!(m.session().is_none());
        assert_eq!(form, before);
    }

    #[test]
    fn retry_returns_to_idle_when_allowed() {
        let (mut m, mut form) = in_error(ErrorCode::Timeout);
        assert_eq!(m.handle(ReviewEvent::Retry, &mut form).unwrap(), StateKind::Idle);
    }

    #[test]
    fn retry_refused_for_no_file_but_new_upload_allowed() {
        let (mut m, mut form) = in_error(ErrorCode::NoFile);
        assert_eq!(
            m.handle(ReviewEvent::Retry, &mut form),
            Err(TransitionError::NotRetryable(ErrorCode::NoFile))
        );
        assert_eq!(m.state().kind(), StateKind::Error);
        assert_eq!(m.handle(ReviewEvent::Upload, &mut form).unwrap(), StateKind::Uploading);
    }

    #[test]
    fn illegal_events_leave_state_unchanged() {
        let mut m = ReviewMachine::new();
        let mut form = BillForm::new();
        for event in [ReviewEvent::Apply, ReviewEvent::Discard, ReviewEvent::Retry, ReviewEvent::Accepted] {
            let kind = event.kind();
            assert_eq!(
                m.handle(event, &mut form),
                Err(TransitionError::Illegal { state: StateKind::Idle, event: kind })
            );
            assert_eq!(m.state(), &ReviewState::Idle);
        }
    }

    #[test]
    fn trail_restarts_at_each_upload() {
        let (mut m, mut form) = in_validation("TARIFA 1C");
        assert_eq!(m.trail(), [StateKind::Uploading, StateKind::Processing, StateKind::Validation]);

        m.handle(ReviewEvent::Apply, &mut form).unwrap();
        assert_eq!(m.trail().last(), Some(&StateKind::Applied));

        m.handle(ReviewEvent::Upload, &mut form).unwrap();
        m.handle(ReviewEvent::Failed(ErrorCode::UnsupportedType.into()), &mut form).unwrap();
        assert_eq!(m.trail(), [StateKind::Uploading, StateKind::Error]);
    }

    #[test]
    fn new_upload_supersedes_validation_session() {
        let (mut m, mut form) = in_validation("TARIFA 1C");
        m.handle(ReviewEvent::Upload, &mut form).unwrap();
        assert!(m.session().is_none());
        assert_eq!(form, BillForm::new());
    }

    #[test]
    fn every_table_entry_is_reachable_via_handle() {
        for &(from, event, to) in TRANSITIONS {
            let (mut m, mut form) = match from {
                StateKind::Idle => (ReviewMachine::new(), BillForm::new()),
                StateKind::Uploading => {
                    let mut m = ReviewMachine::new();
                    let mut f = BillForm::new();
                    m.handle(ReviewEvent::Upload, &mut f).unwrap();
                    (m, f)
                }
                StateKind::Processing => {
                    let mut m = ReviewMachine::new();
                    let mut f = BillForm::new();
                    m.handle(ReviewEvent::Upload, &mut f).unwrap();
                    m.handle(ReviewEvent::Accepted, &mut f).unwrap();
                    (m, f)
                }
                StateKind::Validation => in_validation("TARIFA 1C"),
                StateKind::Error => in_error(ErrorCode::Unexpected),
                StateKind::Applied => {
                    let (mut m, mut f) = in_validation("TARIFA 1C");
                    m.handle(ReviewEvent::Apply, &mut f).unwrap();
                    (m, f)
                }
            };
            let ev = match event {
                EventKind::Upload => ReviewEvent::Upload,
                EventKind::Accepted => ReviewEvent::Accepted,
                EventKind::Succeeded => ReviewEvent::Succeeded(extract_outcome("TARIFA 1C")),
                EventKind::Failed => ReviewEvent::Failed(ErrorCode::Timeout.into()),
                EventKind::Edit => ReviewEvent::Edit { field: BillField::Period, value: "x".into() },
                EventKind::Apply => ReviewEvent::Apply,
                EventKind::Discard => ReviewEvent::Discard,
                EventKind::Retry => ReviewEvent::Retry,
            };
            assert_eq!(m.handle(ev, &mut form), Ok(to), "{from:?} --{event:?}-->");
            assert_eq!(m.state().kind(), to);
        }
    }
}
