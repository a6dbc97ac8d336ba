//! Schedule ledger use-case service.
//!
//! # Responsibility
//! - Assign meals to calendar dates with overwrite semantics.
//! - Render the rolling seven-day window.
//! - Expose eaten count / last eaten statistics over the full history.
//!
//! # Invariants
//! - Every assignment references a meal resolved through the catalog.
//! - The week window is a view; entries outside it are never removed.
//! - Count and last-eaten come from one aggregate over the same entries.

use crate::model::meal::{Meal, MealId, MealKind};
use crate::model::schedule::{
    MealChoice, MealStats, MealSummary, ScheduleEntry, WeekSlot, WEEK_LENGTH_DAYS,
};
use crate::repo::meal_repo::{MealRepository, RepoError, RepoResult};
use crate::repo::plan_repo::PlanRepository;
use crate::service::catalog_service::{CatalogService, CatalogServiceError};
use chrono::{Datelike, Days, Local, NaiveDate};
use log::info;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MIN_PLANNABLE_YEAR: i32 = 1;
const MAX_PLANNABLE_YEAR: i32 = 9999;

/// Service error for schedule use-cases.
#[derive(Debug)]
pub enum ScheduleServiceError {
    /// Assignment or statistics request for a meal outside the catalog.
    UnknownMeal(MealId),
    /// Date cannot be stored or the week window would overflow.
    DateOutOfRange(NaiveDate),
    /// Catalog failure while resolving a `MealChoice`.
    Catalog(CatalogServiceError),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// A schedule entry points at a meal the catalog cannot load.
    InconsistentState(&'static str),
}

impl Display for ScheduleServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMeal(meal_id) => write!(f, "meal is not in the catalog: {meal_id}"),
            Self::DateOutOfRange(day) => write!(f, "date out of plannable range: {day}"),
            Self::Catalog(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent schedule state: {details}"),
        }
    }
}

impl Error for ScheduleServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Catalog(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ScheduleServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::UnknownMeal(meal_id) => Self::UnknownMeal(meal_id),
            other => Self::Repo(other),
        }
    }
}

impl From<CatalogServiceError> for ScheduleServiceError {
    fn from(value: CatalogServiceError) -> Self {
        Self::Catalog(value)
    }
}

pub type ScheduleResult<T> = Result<T, ScheduleServiceError>;

/// Schedule service over a plan repository and a borrowed catalog.
pub struct ScheduleService<'catalog, P: PlanRepository, R: MealRepository> {
    plans: P,
    catalog: &'catalog CatalogService<R>,
}

impl<'catalog, P: PlanRepository, R: MealRepository> ScheduleService<'catalog, P, R> {
    /// Creates a service resolving meals through `catalog`.
    pub fn new(plans: P, catalog: &'catalog CatalogService<R>) -> Self {
        Self { plans, catalog }
    }

    /// Assigns `meal_id` to `day`, replacing any previous assignment.
    ///
    /// # Errors
    /// - `UnknownMeal` when the meal is not in the catalog.
    /// - `DateOutOfRange` for years outside 1..=9999.
    pub fn assign(&self, day: NaiveDate, meal_id: MealId) -> ScheduleResult<()> {
        ensure_plannable(day)?;
        self.plans
            .upsert_planned_day(&ScheduleEntry { day, meal_id })?;
        info!("event=plan_assign module=schedule status=ok day={day} meal_id={meal_id}");
        Ok(())
    }

    /// Resolves a free-entry choice and assigns the resulting meal.
    ///
    /// `NewOtherMeal` adds a meal of kind `other` first; it fails with
    /// `DuplicateName` when that name is already in the catalog.
    pub fn assign_choice(&self, day: NaiveDate, choice: &MealChoice) -> ScheduleResult<Meal> {
        ensure_plannable(day)?;
        let meal = match choice {
            MealChoice::ExistingMealRef(meal_id) => self
                .catalog
                .get_meal(*meal_id)?
                .ok_or(ScheduleServiceError::UnknownMeal(*meal_id))?,
            MealChoice::NewOtherMeal(name) => {
                self.catalog
                    .add_meal(name.as_str(), MealKind::Other, &[] as &[&str])?
            }
        };
        self.assign(day, meal.id)?;
        Ok(meal)
    }

    /// Removes the assignment for `day`. Returns whether one existed.
    pub fn unassign(&self, day: NaiveDate) -> ScheduleResult<bool> {
        let removed = self.plans.delete_planned_day(day)?;
        info!("event=plan_unassign module=schedule status=ok day={day} removed={removed}");
        Ok(removed)
    }

    /// Gets the assignment for one date.
    pub fn entry_for(&self, day: NaiveDate) -> RepoResult<Option<ScheduleEntry>> {
        self.plans.get_planned_day(day)
    }

    /// Entries between `start` and `end` inclusive, ascending by date.
    ///
    /// Both bounds must lie in the plannable range so that the stored text
    /// comparison matches date order.
    pub fn get_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ScheduleResult<Vec<ScheduleEntry>> {
        ensure_plannable(start)?;
        ensure_plannable(end)?;
        Ok(self.plans.list_range(start, end)?)
    }

    /// Seven consecutive slots starting at `start`; unplanned days are empty.
    ///
    /// Fails with `DateOutOfRange` when any day of the window falls outside
    /// years 1..=9999.
    pub fn get_week(&self, start: NaiveDate) -> ScheduleResult<Vec<WeekSlot>> {
        ensure_plannable(start)?;
        let end = start
            .checked_add_days(Days::new(WEEK_LENGTH_DAYS - 1))
            .ok_or(ScheduleServiceError::DateOutOfRange(start))?;
        ensure_plannable(end)?;
        let planned: HashMap<NaiveDate, MealId> = self
            .plans
            .list_range(start, end)?
            .into_iter()
            .map(|entry| (entry.day, entry.meal_id))
            .collect();

        let mut resolved: HashMap<MealId, Meal> = HashMap::new();
        let mut slots = Vec::with_capacity(WEEK_LENGTH_DAYS as usize);
        for day in start.iter_days().take(WEEK_LENGTH_DAYS as usize) {
            let meal = match planned.get(&day) {
                Some(meal_id) => Some(self.resolve_planned_meal(*meal_id, &mut resolved)?),
                None => None,
            };
            slots.push(WeekSlot { day, meal });
        }
        Ok(slots)
    }

    /// The week table starting today (local calendar date).
    pub fn current_week(&self) -> ScheduleResult<Vec<WeekSlot>> {
        self.get_week(Local::now().date_naive())
    }

    /// Eaten count and last-eaten date across the full history.
    pub fn meal_stats(&self, meal_id: MealId) -> ScheduleResult<MealStats> {
        self.plans
            .meal_stats(meal_id)?
            .ok_or(ScheduleServiceError::UnknownMeal(meal_id))
    }

    /// Number of schedule entries referencing the meal.
    pub fn eaten_count(&self, meal_id: MealId) -> ScheduleResult<u32> {
        Ok(self.meal_stats(meal_id)?.eaten_count)
    }

    /// Latest scheduled date for the meal, `None` for never.
    pub fn last_eaten(&self, meal_id: MealId) -> ScheduleResult<Option<NaiveDate>> {
        Ok(self.meal_stats(meal_id)?.last_eaten)
    }

    /// Every catalog meal with its statistics, ordered by name.
    pub fn summarise(&self) -> RepoResult<Vec<MealSummary>> {
        self.plans.summarise()
    }

    fn resolve_planned_meal(
        &self,
        meal_id: MealId,
        resolved: &mut HashMap<MealId, Meal>,
    ) -> ScheduleResult<Meal> {
        if let Some(meal) = resolved.get(&meal_id) {
            return Ok(meal.clone());
        }
        let meal = self
            .catalog
            .get_meal(meal_id)?
            .ok_or(ScheduleServiceError::InconsistentState(
                "planned day references a meal missing from the catalog",
            ))?;
        resolved.insert(meal_id, meal.clone());
        Ok(meal)
    }
}

fn ensure_plannable(day: NaiveDate) -> ScheduleResult<()> {
    if (MIN_PLANNABLE_YEAR..=MAX_PLANNABLE_YEAR).contains(&day.year()) {
        Ok(())
    } else {
        Err(ScheduleServiceError::DateOutOfRange(day))
    }
}
