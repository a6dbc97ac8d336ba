//! Catalog use-case service.
//!
//! # Responsibility
//! - Own the authoritative set of meals: add, look up, list, search, delete.
//! - Parse caller-supplied label text before it reaches storage.
//!
//! # Invariants
//! - Meal names are unique ignoring case; a rejected add leaves the
//!   catalog unchanged.
//! - Meals are only created by explicit calls, never as a side effect of
//!   scheduling.
//! - Deleting a meal with schedule history is refused (`MealInUse`).

use crate::model::label::{normalize_labels, Label, LabelError, LabelFilter};
use crate::model::meal::{Ingredient, Meal, MealId, MealKind, MealValidationError};
use crate::repo::meal_repo::{MealListQuery, MealRepository, RepoError, RepoResult};
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for catalog use-cases.
#[derive(Debug)]
pub enum CatalogServiceError {
    /// A meal with the same name (any case) already exists.
    DuplicateName(String),
    /// A label or label filter is not well-formed `category::value`.
    InvalidLabel(LabelError),
    /// Meal fields (name, kind detail, ingredients) are invalid.
    InvalidMeal(MealValidationError),
    /// Target meal id does not exist.
    MealNotFound(MealId),
    /// No meal has this name.
    NameNotFound(String),
    /// Meal still has schedule entries and cannot be deleted.
    MealInUse { meal_id: MealId, planned_days: u32 },
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for CatalogServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateName(name) => write!(f, "a meal named `{name}` already exists"),
            Self::InvalidLabel(err) => write!(f, "{err}"),
            Self::InvalidMeal(err) => write!(f, "{err}"),
            Self::MealNotFound(meal_id) => write!(f, "meal not found: {meal_id}"),
            Self::NameNotFound(name) => write!(f, "no meal named `{name}`"),
            Self::MealInUse {
                meal_id,
                planned_days,
            } => write!(
                f,
                "meal {meal_id} is planned on {planned_days} day(s) and cannot be deleted"
            ),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent catalog state: {details}"),
        }
    }
}

impl Error for CatalogServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidLabel(err) => Some(err),
            Self::InvalidMeal(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CatalogServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::DuplicateName(name) => Self::DuplicateName(name),
            RepoError::NotFound(meal_id) => Self::MealNotFound(meal_id),
            RepoError::Validation(err) => Self::InvalidMeal(err),
            RepoError::MealInUse {
                meal_id,
                planned_days,
            } => Self::MealInUse {
                meal_id,
                planned_days,
            },
            other => Self::Repo(other),
        }
    }
}

impl From<LabelError> for CatalogServiceError {
    fn from(value: LabelError) -> Self {
        Self::InvalidLabel(value)
    }
}

impl From<MealValidationError> for CatalogServiceError {
    fn from(value: MealValidationError) -> Self {
        Self::InvalidMeal(value)
    }
}

pub type CatalogResult<T> = Result<T, CatalogServiceError>;

/// Editable recipe fields, used to create or replace a meal's detail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeDraft {
    pub name: String,
    pub instructions: String,
    pub ingredients: Vec<Ingredient>,
    /// Raw `category::value` strings.
    pub labels: Vec<String>,
}

/// Catalog service facade over repository implementations.
pub struct CatalogService<R: MealRepository> {
    repo: R,
}

impl<R: MealRepository> CatalogService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Adds a meal without recipe detail.
    ///
    /// # Errors
    /// - `DuplicateName` when a meal with the same name exists (any case).
    /// - `InvalidLabel` when a label is not `category::value`.
    pub fn add_meal<S: AsRef<str>>(
        &self,
        name: &str,
        kind: MealKind,
        labels: &[S],
    ) -> CatalogResult<Meal> {
        let mut meal = Meal::new(kind, name);
        meal.labels = normalize_labels(labels)?;
        self.insert(meal)
    }

    /// Adds a recipe with instructions, ingredients and labels in one write.
    pub fn add_recipe(&self, draft: &RecipeDraft) -> CatalogResult<Meal> {
        let mut meal = Meal::new(MealKind::Recipe, draft.name.as_str());
        apply_draft(&mut meal, draft)?;
        self.insert(meal)
    }

    /// Replaces name, detail and labels of an existing meal. The kind is kept.
    pub fn update_meal(&self, meal_id: MealId, draft: &RecipeDraft) -> CatalogResult<Meal> {
        let existing = self
            .repo
            .get_meal(meal_id)?
            .ok_or(CatalogServiceError::MealNotFound(meal_id))?;

        let mut meal = Meal::with_id(meal_id, existing.kind, draft.name.as_str());
        apply_draft(&mut meal, draft)?;
        self.repo.update_meal(&meal)?;
        info!(
            "event=meal_update module=catalog status=ok meal_id={} kind={}",
            meal_id, meal.kind
        );
        self.read_back(meal_id, "updated meal not found in read-back")
    }

    /// Atomically replaces the label set of a meal.
    pub fn set_labels<S: AsRef<str>>(&self, meal_id: MealId, labels: &[S]) -> CatalogResult<Meal> {
        let labels = normalize_labels(labels)?;
        self.repo.set_meal_labels(meal_id, &labels)?;
        debug!(
            "event=meal_labels_set module=catalog status=ok meal_id={} label_count={}",
            meal_id,
            labels.len()
        );
        self.read_back(meal_id, "meal missing after label replacement")
    }

    /// Gets one meal by stable ID.
    pub fn get_meal(&self, meal_id: MealId) -> RepoResult<Option<Meal>> {
        self.repo.get_meal(meal_id)
    }

    /// Exact, case-insensitive name lookup, e.g. for an autocomplete pick.
    pub fn find_by_name(&self, name: &str) -> RepoResult<Option<Meal>> {
        self.repo.find_by_name(name)
    }

    /// Like `find_by_name`, for callers that expect the meal to exist.
    pub fn require_by_name(&self, name: &str) -> CatalogResult<Meal> {
        self.repo
            .find_by_name(name)?
            .ok_or_else(|| CatalogServiceError::NameNotFound(name.trim().to_string()))
    }

    /// Lists meals in insertion order.
    ///
    /// With a filter, only meals satisfying every predicate are returned;
    /// `category::*` matches any label in that category.
    pub fn list_meals(&self, filter: Option<&LabelFilter>) -> RepoResult<Vec<Meal>> {
        let labels = filter.cloned().unwrap_or_else(LabelFilter::all);
        self.repo.list_meals(&MealListQuery::labels(labels))
    }

    /// Parses raw predicate strings and lists the matching meals.
    pub fn list_meals_matching<S: AsRef<str>>(&self, predicates: &[S]) -> CatalogResult<Vec<Meal>> {
        let filter = LabelFilter::parse(predicates)?;
        Ok(self.repo.list_meals(&MealListQuery::labels(filter))?)
    }

    /// Lists meals with the full query, including the ingredient filter.
    pub fn query_meals(&self, query: &MealListQuery) -> RepoResult<Vec<Meal>> {
        self.repo.list_meals(query)
    }

    /// Autocomplete suggestions: case-insensitive name prefix, ordered by
    /// name. `limit = None` means unbounded.
    pub fn search_by_prefix(&self, text: &str, limit: Option<u32>) -> RepoResult<Vec<Meal>> {
        self.repo.search_by_prefix(text, limit)
    }

    /// Distinct labels in use across the catalog.
    pub fn list_labels(&self) -> RepoResult<Vec<Label>> {
        self.repo.list_labels()
    }

    /// Deletes a meal that has never been scheduled.
    pub fn delete_meal(&self, meal_id: MealId) -> CatalogResult<()> {
        self.repo.delete_meal(meal_id)?;
        info!("event=meal_delete module=catalog status=ok meal_id={meal_id}");
        Ok(())
    }

    fn insert(&self, meal: Meal) -> CatalogResult<Meal> {
        let meal_id = self.repo.create_meal(&meal)?;
        info!(
            "event=meal_add module=catalog status=ok meal_id={} kind={} label_count={}",
            meal_id,
            meal.kind,
            meal.labels.len()
        );
        self.read_back(meal_id, "created meal not found in read-back")
    }

    fn read_back(&self, meal_id: MealId, details: &'static str) -> CatalogResult<Meal> {
        self.repo
            .get_meal(meal_id)?
            .ok_or(CatalogServiceError::InconsistentState(details))
    }
}

fn apply_draft(meal: &mut Meal, draft: &RecipeDraft) -> CatalogResult<()> {
    meal.labels = normalize_labels(&draft.labels)?;
    meal.instructions = draft.instructions.trim().to_string();
    meal.ingredients = draft
        .ingredients
        .iter()
        .map(|ingredient| {
            Ingredient::new(
                ingredient.name.as_str(),
                ingredient.quantity,
                ingredient.unit.as_str(),
            )
        })
        .collect();
    meal.validate()?;
    Ok(())
}
