//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into catalog, schedule and timing APIs.
//! - Keep CLI and other application layers decoupled from storage details.
//!
//! The catalog service is constructed once per connection and passed by
//! reference to the schedule service; there is no process-wide catalog.

pub mod catalog_service;
pub mod schedule_service;
pub mod timing_service;
