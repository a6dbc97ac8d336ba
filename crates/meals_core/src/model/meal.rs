//! Meal catalog model.
//!
//! # Responsibility
//! - Define the catalog entry shared by recipes and "other" meals.
//! - Validate recipe detail (instructions and ingredients).
//!
//! # Invariants
//! - `id` is stable and never reused for another meal.
//! - Names are unique within a catalog, compared via `name_key`.
//! - An `Other` meal carries no instructions and no ingredients.

use crate::model::label::Label;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a catalog meal.
pub type MealId = Uuid;

static INGREDIENT_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<name>.*?\S)\s+(?P<quantity>\d+(?:\.\d+)?)\s*(?P<unit>[^\s\d.].*?)\s*$")
        .expect("valid ingredient line regex")
});

/// Distinguishes full recipes from ad-hoc meals such as a takeaway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealKind {
    /// Cooked from instructions and ingredients.
    Recipe,
    /// No recipe detail, e.g. "Take Away".
    Other,
}

impl MealKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recipe => "recipe",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "recipe" => Some(Self::Recipe),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Whether instructions and ingredients are meaningful for this kind.
    pub fn has_detail(self) -> bool {
        matches!(self, Self::Recipe)
    }
}

impl Display for MealKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures for meals and their ingredients.
#[derive(Debug, Clone, PartialEq)]
pub enum MealValidationError {
    /// Name is empty after trimming.
    EmptyName,
    /// An `Other` meal was given instructions or ingredients.
    DetailOnOtherMeal,
    /// Ingredient text or fields are malformed.
    InvalidIngredient { input: String, reason: &'static str },
    /// The same ingredient appears twice in one recipe.
    DuplicateIngredient(String),
}

impl Display for MealValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "meal name cannot be empty"),
            Self::DetailOnOtherMeal => {
                write!(f, "only recipes can have instructions or ingredients")
            }
            Self::InvalidIngredient { input, reason } => {
                write!(f, "invalid ingredient `{input}`: {reason}")
            }
            Self::DuplicateIngredient(name) => {
                write!(f, "ingredient `{name}` is listed more than once")
            }
        }
    }
}

impl Error for MealValidationError {}

/// One ingredient line of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            quantity,
            unit: unit.into().trim().to_string(),
        }
    }

    /// Parses a free-text `name quantity unit` line, e.g. `Carrot 10 units`.
    pub fn parse(line: &str) -> Result<Self, MealValidationError> {
        let invalid = |reason| MealValidationError::InvalidIngredient {
            input: line.to_string(),
            reason,
        };
        let caps = INGREDIENT_LINE_RE
            .captures(line)
            .ok_or_else(|| invalid("expected `name quantity unit`"))?;
        let quantity = caps["quantity"]
            .parse::<f64>()
            .map_err(|_| invalid("quantity is not a number"))?;

        let ingredient = Self::new(&caps["name"], quantity, &caps["unit"]);
        ingredient.validate()?;
        Ok(ingredient)
    }

    /// Checks ingredient fields.
    pub fn validate(&self) -> Result<(), MealValidationError> {
        let invalid = |reason| MealValidationError::InvalidIngredient {
            input: self.name.clone(),
            reason,
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.unit.trim().is_empty() {
            return Err(invalid("unit is empty"));
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(invalid("quantity must be a positive number"));
        }
        Ok(())
    }
}

/// Catalog entry: a recipe or an "other" meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    /// Assigned at creation, immutable.
    pub id: MealId,
    /// Display name, trimmed.
    pub name: String,
    pub kind: MealKind,
    /// Sorted and deduplicated.
    pub labels: Vec<Label>,
    /// Meaningful only when `kind == MealKind::Recipe`.
    pub instructions: String,
    /// Meaningful only when `kind == MealKind::Recipe`. Order is preserved.
    pub ingredients: Vec<Ingredient>,
}

impl Meal {
    /// Creates a meal with a generated stable ID and no labels or detail.
    pub fn new(kind: MealKind, name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), kind, name)
    }

    /// Creates a meal with a caller-provided ID.
    pub fn with_id(id: MealId, kind: MealKind, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into().trim().to_string(),
            kind,
            labels: Vec::new(),
            instructions: String::new(),
            ingredients: Vec::new(),
        }
    }

    /// Case-insensitive uniqueness key for this meal's name.
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    /// Checks catalog invariants before persistence.
    pub fn validate(&self) -> Result<(), MealValidationError> {
        if self.name.trim().is_empty() {
            return Err(MealValidationError::EmptyName);
        }

        if !self.kind.has_detail()
            && (!self.instructions.trim().is_empty() || !self.ingredients.is_empty())
        {
            return Err(MealValidationError::DetailOnOtherMeal);
        }

        let mut seen = HashSet::new();
        for ingredient in &self.ingredients {
            ingredient.validate()?;
            if !seen.insert(name_key(&ingredient.name)) {
                return Err(MealValidationError::DuplicateIngredient(
                    ingredient.name.clone(),
                ));
            }
        }

        Ok(())
    }
}

/// Normalizes a meal name into its case-insensitive lookup key.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
