//! Human validation of OCR proposals before they reach the bill form.

pub mod machine;
pub mod session;

pub use machine::{
    target, EventKind, ReviewEvent, ReviewMachine, ReviewState, StateKind, TransitionError,
    TRANSITIONS,
};
pub use session::ValidationSession;
