//! Domain model for the meal catalog and the schedule ledger.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own the parsing rules for labels, label filters, ingredient lines
//!   and roast timing steps.
//!
//! # Invariants
//! - Every meal is identified by a stable `MealId` assigned at creation.
//! - A `Label` value is always well-formed `category::value`.
//! - Schedule entries are keyed by calendar date; one meal per date.

pub mod label;
pub mod meal;
pub mod schedule;
pub mod timing;
