//! Request validation
//!
//! A declarative approach to validating and filtering request input before it
//! reaches the handlers: rule sets per route, plus axum extractors that
//! apply them.

pub mod extractor;
pub mod filters;
pub mod rules;
pub mod validators;

pub use extractor::{
    ValidatedId, ValidatedJson, ValidatedPayload, ValidatedQuery, ValidatedStatusUpdate,
};
pub use rules::{FieldRules, RuleSet};
