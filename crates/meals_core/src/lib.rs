//! Core domain logic for the meal planner.
//! This crate is the single source of truth for catalog and schedule
//! invariants: unique meal names, one meal per date, and statistics
//! derived from the full schedule history. It also keeps one roast timing
//! sheet that counts steps back from a finish time.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::label::{Label, LabelError, LabelFilter, LabelPredicate};
pub use model::meal::{Ingredient, Meal, MealId, MealKind, MealValidationError};
pub use model::schedule::{
    MealChoice, MealStats, MealSummary, ScheduleEntry, WeekSlot, WEEK_LENGTH_DAYS,
};
pub use model::timing::{parse_clock_time, TimedStep, TimingStep, TimingValidationError, Timings};
pub use repo::meal_repo::{
    MealListQuery, MealRepository, RepoError, RepoResult, SqliteMealRepository,
};
pub use repo::plan_repo::{PlanRepository, SqlitePlanRepository};
pub use repo::timing_repo::{SqliteTimingRepository, TimingRepository};
pub use service::catalog_service::{
    CatalogResult, CatalogService, CatalogServiceError, RecipeDraft,
};
pub use service::schedule_service::{ScheduleResult, ScheduleService, ScheduleServiceError};
pub use service::timing_service::{TimingResult, TimingService, TimingServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
