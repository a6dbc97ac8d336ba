//! Meal labels and label filters.
//!
//! Labels are `category::value` strings such as `carb::pasta`. Beyond the
//! category/value split the text is opaque: it is compared case-sensitively
//! and never rewritten apart from trimming whitespace around each part.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Separator between label category and value.
pub const LABEL_SEPARATOR: &str = "::";
/// Filter value matching every label of a category (`carb::*`).
pub const WILDCARD_VALUE: &str = "*";

/// Malformed label or label predicate text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelError {
    /// Raw input as provided by the caller.
    pub input: String,
    /// Short machine-stable reason.
    pub reason: &'static str,
}

impl LabelError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

impl Display for LabelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid label `{}`: {}; expected `category::value`",
            self.input, self.reason
        )
    }
}

impl Error for LabelError {}

/// Well-formed `category::value` tag attached to a meal.
///
/// Ordering is by category, then value, which is the order labels are
/// returned in everywhere.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label {
    category: String,
    value: String,
}

impl Label {
    /// Builds a label from its parts.
    pub fn new(category: &str, value: &str) -> Result<Self, LabelError> {
        let raw = format!("{category}{LABEL_SEPARATOR}{value}");
        let category = validate_category(category, &raw)?;
        let value = value.trim();
        if value.is_empty() {
            return Err(LabelError::new(&raw, "value is empty"));
        }
        if value == WILDCARD_VALUE {
            return Err(LabelError::new(&raw, "`*` is reserved for filters"));
        }
        if value.contains(LABEL_SEPARATOR) {
            return Err(LabelError::new(&raw, "value contains `::`"));
        }

        Ok(Self {
            category: category.to_string(),
            value: value.to_string(),
        })
    }

    /// Parses `category::value` text.
    pub fn parse(raw: &str) -> Result<Self, LabelError> {
        let (category, value) = split_label(raw)?;
        Self::new(category, value).map_err(|err| LabelError::new(raw, err.reason))
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{LABEL_SEPARATOR}{}", self.category, self.value)
    }
}

impl FromStr for Label {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Label {
    type Error = LabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<Label> for String {
    fn from(value: Label) -> Self {
        value.to_string()
    }
}

/// Parses, deduplicates and sorts raw label strings.
///
/// Fails on the first malformed entry; nothing is partially applied.
pub fn normalize_labels<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Label>, LabelError> {
    let mut unique = BTreeSet::new();
    for value in raw {
        unique.insert(Label::parse(value.as_ref())?);
    }
    Ok(unique.into_iter().collect())
}

/// One condition of a catalog label filter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LabelPredicate {
    /// Meal carries exactly this label.
    Exact(Label),
    /// Meal carries any label in this category (`category::*`).
    AnyInCategory(String),
}

impl LabelPredicate {
    /// Parses `category::value` or `category::*`.
    pub fn parse(raw: &str) -> Result<Self, LabelError> {
        let (category, value) = split_label(raw)?;
        if value.trim() == WILDCARD_VALUE {
            let category = validate_category(category, raw)?;
            return Ok(Self::AnyInCategory(category.to_string()));
        }
        Label::parse(raw).map(Self::Exact)
    }

    /// Returns whether a label set satisfies this predicate.
    pub fn matches(&self, labels: &[Label]) -> bool {
        match self {
            Self::Exact(wanted) => labels.contains(wanted),
            Self::AnyInCategory(category) => {
                labels.iter().any(|label| label.category() == category)
            }
        }
    }
}

impl Display for LabelPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(label) => write!(f, "{label}"),
            Self::AnyInCategory(category) => {
                write!(f, "{category}{LABEL_SEPARATOR}{WILDCARD_VALUE}")
            }
        }
    }
}

/// Conjunctive set of label predicates. An empty filter matches every meal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    predicates: BTreeSet<LabelPredicate>,
}

impl LabelFilter {
    /// Filter that matches every meal.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parses a set of predicate strings.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self, LabelError> {
        let mut predicates = BTreeSet::new();
        for value in raw {
            predicates.insert(LabelPredicate::parse(value.as_ref())?);
        }
        Ok(Self { predicates })
    }

    /// Adds one predicate, returning the extended filter.
    pub fn with(mut self, predicate: LabelPredicate) -> Self {
        self.predicates.insert(predicate);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn predicates(&self) -> impl Iterator<Item = &LabelPredicate> {
        self.predicates.iter()
    }

    /// Returns whether a label set satisfies every predicate.
    pub fn matches(&self, labels: &[Label]) -> bool {
        self.predicates
            .iter()
            .all(|predicate| predicate.matches(labels))
    }
}

fn split_label(raw: &str) -> Result<(&str, &str), LabelError> {
    raw.split_once(LABEL_SEPARATOR)
        .ok_or_else(|| LabelError::new(raw, "missing `::` separator"))
}

fn validate_category<'a>(category: &'a str, raw: &str) -> Result<&'a str, LabelError> {
    let category = category.trim();
    if category.is_empty() {
        return Err(LabelError::new(raw, "category is empty"));
    }
    if category == WILDCARD_VALUE {
        return Err(LabelError::new(raw, "`*` is reserved for filters"));
    }
    if category.contains(LABEL_SEPARATOR) {
        return Err(LabelError::new(raw, "category contains `::`"));
    }
    Ok(category)
}
