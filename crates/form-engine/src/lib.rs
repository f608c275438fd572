//! Dynamic form engine for field-service work orders.
//!
//! Operators define versioned form *templates* (fields, validation rules,
//! conditional visibility, computed fields) and technicians later record
//! *submissions* against a published template version. The crate owns the
//! template and submission lifecycles plus the three rule services that make
//! them safe: the conditional-logic evaluator, the formula calculation
//! engine, and the submission validator.
//!
//! Persistence and transport are external collaborators; they reach the core
//! only through the repository contracts and the [`forms::FormService`] use
//! cases.

pub mod forms;
