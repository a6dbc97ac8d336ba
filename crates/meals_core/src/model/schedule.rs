//! Schedule ledger model.
//!
//! # Invariants
//! - `ScheduleEntry::day` is unique within a ledger.
//! - `MealStats` is always derived from the full entry history, never
//!   cached alongside it.

use crate::model::meal::{Meal, MealId, MealKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of days in the rolling display window.
pub const WEEK_LENGTH_DAYS: u64 = 7;

/// One date's meal assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub day: NaiveDate,
    pub meal_id: MealId,
}

/// Derived eating statistics for one meal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealStats {
    /// Number of schedule entries referencing the meal.
    pub eaten_count: u32,
    /// Latest scheduled date, `None` when the meal was never scheduled.
    pub last_eaten: Option<NaiveDate>,
}

/// Catalog meal with its statistics, as shown in the summary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealSummary {
    pub meal_id: MealId,
    pub name: String,
    pub kind: MealKind,
    #[serde(flatten)]
    pub stats: MealStats,
}

/// One row of the week table; `meal` is `None` for unplanned days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekSlot {
    pub day: NaiveDate,
    pub meal: Option<Meal>,
}

/// Result of the free-entry meal field, resolved before assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MealChoice {
    /// The entry matched an existing catalog meal.
    ExistingMealRef(MealId),
    /// The entry is a new ad-hoc meal to add as kind `other`.
    NewOtherMeal(String),
}
