//! Patient input loading

mod patient;

pub use patient::{PatientRecord, NAME_COLUMN};
