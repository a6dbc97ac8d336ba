//! Meal catalog repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/update/lookup/list/delete APIs over the `meals` table.
//! - Own label and ingredient link replacement for one meal.
//!
//! # Invariants
//! - Write paths call `Meal::validate()` before SQL mutations.
//! - Name uniqueness is checked against `name_key` inside the same
//!   immediate transaction that writes the row.
//! - A meal referenced by any `planned_days` row is never deleted.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::label::{Label, LabelFilter, LabelPredicate};
use crate::model::meal::{name_key, Ingredient, Meal, MealId, MealKind, MealValidationError};
use crate::model::timing::TimingValidationError;
use crate::repo::ensure_connection_ready;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const MEAL_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    kind,
    instructions
FROM meals";

const REQUIRED_TABLES: &[&str] = &[
    "meals",
    "meal_labels",
    "ingredients",
    "meal_ingredients",
    "planned_days",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by catalog, ledger and timing persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(MealValidationError),
    TimingValidation(TimingValidationError),
    Db(DbError),
    /// Target meal does not exist.
    NotFound(MealId),
    /// Another meal already uses this name (case-insensitive).
    DuplicateName(String),
    /// A schedule entry would reference a meal outside the catalog.
    UnknownMeal(MealId),
    /// Meal is still referenced by schedule entries.
    MealInUse { meal_id: MealId, planned_days: u32 },
    /// A timing sheet is already stored; use the upsert path instead.
    TimingsAlreadyExist,
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::TimingValidation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "meal not found: {id}"),
            Self::DuplicateName(name) => write!(f, "a meal named `{name}` already exists"),
            Self::UnknownMeal(id) => write!(f, "meal is not in the catalog: {id}"),
            Self::MealInUse {
                meal_id,
                planned_days,
            } => write!(
                f,
                "meal {meal_id} is referenced by {planned_days} planned day(s)"
            ),
            Self::TimingsAlreadyExist => write!(f, "a timing sheet already exists"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "meals repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "meals repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted meal data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::TimingValidation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MealValidationError> for RepoError {
    fn from(value: MealValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<TimingValidationError> for RepoError {
    fn from(value: TimingValidationError) -> Self {
        Self::TimingValidation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for catalog listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MealListQuery {
    /// Conjunctive label predicates; empty matches every meal.
    pub labels: LabelFilter,
    /// Keep only meals with at least one ingredient, e.g. for shopping lists.
    pub with_ingredients_only: bool,
}

impl MealListQuery {
    pub fn labels(labels: LabelFilter) -> Self {
        Self {
            labels,
            with_ingredients_only: false,
        }
    }
}

/// Repository interface for the meal catalog.
pub trait MealRepository {
    /// Inserts one meal with its labels and ingredients.
    fn create_meal(&self, meal: &Meal) -> RepoResult<MealId>;
    /// Replaces name, kind, instructions, labels and ingredients of a meal.
    fn update_meal(&self, meal: &Meal) -> RepoResult<()>;
    /// Replaces the full label set of a meal.
    fn set_meal_labels(&self, meal_id: MealId, labels: &[Label]) -> RepoResult<()>;
    fn get_meal(&self, meal_id: MealId) -> RepoResult<Option<Meal>>;
    /// Exact, case-insensitive name lookup.
    fn find_by_name(&self, name: &str) -> RepoResult<Option<Meal>>;
    /// Lists meals in insertion order, restricted by the query.
    fn list_meals(&self, query: &MealListQuery) -> RepoResult<Vec<Meal>>;
    /// Case-insensitive name-prefix search ordered by name.
    fn search_by_prefix(&self, prefix: &str, limit: Option<u32>) -> RepoResult<Vec<Meal>>;
    /// Distinct labels in use, ordered by category then value.
    fn list_labels(&self) -> RepoResult<Vec<Label>>;
    /// Deletes a meal that no schedule entry references.
    fn delete_meal(&self, meal_id: MealId) -> RepoResult<()>;
}

/// SQLite-backed meal catalog repository.
pub struct SqliteMealRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMealRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    fn begin_write(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl MealRepository for SqliteMealRepository<'_> {
    fn create_meal(&self, meal: &Meal) -> RepoResult<MealId> {
        meal.validate()?;

        let tx = self.begin_write()?;
        let key = meal.name_key();
        if name_taken(&tx, &key, None)? {
            return Err(RepoError::DuplicateName(meal.name.clone()));
        }

        tx.execute(
            "INSERT INTO meals (
                uuid,
                name,
                name_key,
                kind,
                instructions
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                meal.id.to_string(),
                meal.name.as_str(),
                key,
                meal.kind.as_str(),
                meal.instructions.as_str(),
            ],
        )?;
        write_labels(&tx, meal.id, &meal.labels)?;
        write_ingredients(&tx, meal.id, &meal.ingredients)?;
        tx.commit()?;

        Ok(meal.id)
    }

    fn update_meal(&self, meal: &Meal) -> RepoResult<()> {
        meal.validate()?;

        let tx = self.begin_write()?;
        let key = meal.name_key();
        if name_taken(&tx, &key, Some(meal.id))? {
            return Err(RepoError::DuplicateName(meal.name.clone()));
        }

        let changed = tx.execute(
            "UPDATE meals
             SET
                name = ?2,
                name_key = ?3,
                kind = ?4,
                instructions = ?5,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                meal.id.to_string(),
                meal.name.as_str(),
                key,
                meal.kind.as_str(),
                meal.instructions.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(meal.id));
        }

        write_labels(&tx, meal.id, &meal.labels)?;
        write_ingredients(&tx, meal.id, &meal.ingredients)?;
        tx.commit()?;
        Ok(())
    }

    fn set_meal_labels(&self, meal_id: MealId, labels: &[Label]) -> RepoResult<()> {
        let tx = self.begin_write()?;
        let changed = tx.execute(
            "UPDATE meals
             SET updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            [meal_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(meal_id));
        }

        write_labels(&tx, meal_id, labels)?;
        tx.commit()?;
        Ok(())
    }

    fn get_meal(&self, meal_id: MealId) -> RepoResult<Option<Meal>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEAL_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([meal_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_meal_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn find_by_name(&self, name: &str) -> RepoResult<Option<Meal>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEAL_SELECT_SQL} WHERE name_key = ?1;"))?;
        let mut rows = stmt.query([name_key(name)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_meal_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_meals(&self, query: &MealListQuery) -> RepoResult<Vec<Meal>> {
        let mut sql = format!("{MEAL_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if query.with_ingredients_only {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1
                    FROM meal_ingredients mi
                    WHERE mi.meal_uuid = meals.uuid
                )",
            );
        }

        for predicate in query.labels.predicates() {
            match predicate {
                LabelPredicate::Exact(label) => {
                    sql.push_str(
                        " AND EXISTS (
                            SELECT 1
                            FROM meal_labels ml
                            WHERE ml.meal_uuid = meals.uuid
                              AND ml.category = ?
                              AND ml.value = ?
                        )",
                    );
                    bind_values.push(Value::Text(label.category().to_string()));
                    bind_values.push(Value::Text(label.value().to_string()));
                }
                LabelPredicate::AnyInCategory(category) => {
                    sql.push_str(
                        " AND EXISTS (
                            SELECT 1
                            FROM meal_labels ml
                            WHERE ml.meal_uuid = meals.uuid
                              AND ml.category = ?
                        )",
                    );
                    bind_values.push(Value::Text(category.clone()));
                }
            }
        }

        sql.push_str(" ORDER BY seq ASC;");
        collect_meals(self.conn, &sql, bind_values)
    }

    fn search_by_prefix(&self, prefix: &str, limit: Option<u32>) -> RepoResult<Vec<Meal>> {
        let sql = format!(
            "{MEAL_SELECT_SQL}
             WHERE substr(name_key, 1, length(?1)) = ?1
             ORDER BY name_key ASC, seq ASC
             LIMIT ?2;"
        );
        let bind_values = vec![
            Value::Text(name_key(prefix)),
            Value::Integer(limit.map_or(-1, i64::from)),
        ];
        collect_meals(self.conn, &sql, bind_values)
    }

    fn list_labels(&self) -> RepoResult<Vec<Label>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT category, value
             FROM meal_labels
             ORDER BY category ASC, value ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut labels = Vec::new();
        while let Some(row) = rows.next()? {
            labels.push(parse_label_row(row)?);
        }
        Ok(labels)
    }

    fn delete_meal(&self, meal_id: MealId) -> RepoResult<()> {
        let tx = self.begin_write()?;
        let meal_uuid = meal_id.to_string();

        let planned_days: i64 = tx.query_row(
            "SELECT COUNT(*) FROM planned_days WHERE meal_uuid = ?1;",
            [meal_uuid.as_str()],
            |row| row.get(0),
        )?;
        if planned_days > 0 {
            return Err(RepoError::MealInUse {
                meal_id,
                planned_days: count_to_u32(planned_days)?,
            });
        }

        let changed = tx.execute("DELETE FROM meals WHERE uuid = ?1;", [meal_uuid.as_str()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(meal_id));
        }

        tx.commit()?;
        Ok(())
    }
}

/// Converts a SQLite `COUNT(*)` into the public counter type.
pub(crate) fn count_to_u32(value: i64) -> RepoResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("count `{value}` out of range")))
}

pub(crate) fn parse_meal_id(value: &str) -> RepoResult<MealId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in meals.uuid")))
}

pub(crate) fn parse_meal_kind(value: &str) -> RepoResult<MealKind> {
    MealKind::parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid meal kind `{value}` in meals.kind")))
}

fn name_taken(conn: &Connection, key: &str, except: Option<MealId>) -> RepoResult<bool> {
    let except = except.map(|id| id.to_string()).unwrap_or_default();
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM meals
            WHERE name_key = ?1
              AND uuid <> ?2
        );",
        params![key, except],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn write_labels(conn: &Connection, meal_id: MealId, labels: &[Label]) -> RepoResult<()> {
    let meal_uuid = meal_id.to_string();
    conn.execute(
        "DELETE FROM meal_labels WHERE meal_uuid = ?1;",
        [meal_uuid.as_str()],
    )?;
    for label in labels {
        conn.execute(
            "INSERT OR IGNORE INTO meal_labels (meal_uuid, category, value)
             VALUES (?1, ?2, ?3);",
            params![meal_uuid.as_str(), label.category(), label.value()],
        )?;
    }
    Ok(())
}

fn write_ingredients(
    conn: &Connection,
    meal_id: MealId,
    ingredients: &[Ingredient],
) -> RepoResult<()> {
    let meal_uuid = meal_id.to_string();
    conn.execute(
        "DELETE FROM meal_ingredients WHERE meal_uuid = ?1;",
        [meal_uuid.as_str()],
    )?;
    for (position, ingredient) in ingredients.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO ingredients (name) VALUES (?1);",
            [ingredient.name.as_str()],
        )?;
        conn.execute(
            "INSERT INTO meal_ingredients (meal_uuid, ingredient_id, position, quantity, unit)
             SELECT ?1, id, ?2, ?3, ?4
             FROM ingredients
             WHERE name = ?5;",
            params![
                meal_uuid.as_str(),
                position as i64,
                ingredient.quantity,
                ingredient.unit.as_str(),
                ingredient.name.as_str(),
            ],
        )?;
    }
    Ok(())
}

fn collect_meals(conn: &Connection, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Meal>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut meals = Vec::new();
    while let Some(row) = rows.next()? {
        meals.push(parse_meal_row(conn, row)?);
    }
    Ok(meals)
}

fn parse_meal_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Meal> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_meal_id(&uuid_text)?;
    let kind_text: String = row.get("kind")?;
    let kind = parse_meal_kind(&kind_text)?;

    let meal = Meal {
        id,
        name: row.get("name")?,
        kind,
        labels: load_labels(conn, &uuid_text)?,
        instructions: row.get("instructions")?,
        ingredients: load_ingredients(conn, &uuid_text)?,
    };
    meal.validate()
        .map_err(|err| RepoError::InvalidData(format!("meal {id}: {err}")))?;
    Ok(meal)
}

fn load_labels(conn: &Connection, meal_uuid: &str) -> RepoResult<Vec<Label>> {
    let mut stmt = conn.prepare(
        "SELECT category, value
         FROM meal_labels
         WHERE meal_uuid = ?1
         ORDER BY category ASC, value ASC;",
    )?;
    let mut rows = stmt.query([meal_uuid])?;
    let mut labels = Vec::new();
    while let Some(row) = rows.next()? {
        labels.push(parse_label_row(row)?);
    }
    Ok(labels)
}

fn parse_label_row(row: &Row<'_>) -> RepoResult<Label> {
    let category: String = row.get("category")?;
    let value: String = row.get("value")?;
    Label::new(&category, &value).map_err(|err| RepoError::InvalidData(err.to_string()))
}

fn load_ingredients(conn: &Connection, meal_uuid: &str) -> RepoResult<Vec<Ingredient>> {
    let mut stmt = conn.prepare(
        "SELECT i.name, mi.quantity, mi.unit
         FROM meal_ingredients mi
         INNER JOIN ingredients i ON i.id = mi.ingredient_id
         WHERE mi.meal_uuid = ?1
         ORDER BY mi.position ASC;",
    )?;
    let mut rows = stmt.query([meal_uuid])?;
    let mut ingredients = Vec::new();
    while let Some(row) = rows.next()? {
        ingredients.push(Ingredient {
            name: row.get(0)?,
            quantity: row.get(1)?,
            unit: row.get(2)?,
        });
    }
    Ok(ingredients)
}
