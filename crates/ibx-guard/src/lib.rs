//! Validation and confirmation guardrails.
//!
//! Every intent passes the validator before becoming an `Action`, and
//! every mutating action passes the confirmation gate before it may be
//! submitted. There is no other path to submission.

pub mod confirm;
pub mod validator;

pub use confirm::{ConfirmError, ConfirmationGate, ConfirmationTicket, GateConfig};
pub use validator::{validate, ValidationError};
