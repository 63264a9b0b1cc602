//! Core types, validation, and alert rules for the field telemetry pipeline.

pub mod alert;
pub mod backend;
pub mod error;
pub mod reading;
pub mod retry;
pub mod validation;

pub use alert::*;
pub use backend::*;
pub use error::{Backend, Error, Result};
pub use reading::*;
pub use retry::RetryPolicy;
pub use validation::{validate_reading, ValidationFailure};
