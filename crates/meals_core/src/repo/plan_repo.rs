//! Schedule ledger repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist date -> meal assignments in `planned_days`.
//! - Derive eaten count and last-eaten date from the full history.
//!
//! # Invariants
//! - `day` is the primary key: assigning an already planned day replaces
//!   the previous meal in the same statement.
//! - Statistics are aggregated on read from `planned_days`; there are no
//!   stored counters.
//! - Days are stored as ISO `YYYY-MM-DD` text, so text order is date order.

use crate::model::meal::MealId;
use crate::model::schedule::{MealStats, MealSummary, ScheduleEntry};
use crate::repo::ensure_connection_ready;
use crate::repo::meal_repo::{
    count_to_u32, parse_meal_id, parse_meal_kind, RepoError, RepoResult,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

const DAY_FORMAT: &str = "%Y-%m-%d";
const REQUIRED_TABLES: &[&str] = &["meals", "planned_days"];

/// Repository interface for the schedule ledger.
pub trait PlanRepository {
    /// Inserts or replaces the entry for `entry.day`.
    ///
    /// Fails with `RepoError::UnknownMeal` when the meal is not in the
    /// catalog; nothing is written in that case.
    fn upsert_planned_day(&self, entry: &ScheduleEntry) -> RepoResult<()>;
    /// Removes the entry for `day`. Returns whether an entry existed.
    fn delete_planned_day(&self, day: NaiveDate) -> RepoResult<bool>;
    fn get_planned_day(&self, day: NaiveDate) -> RepoResult<Option<ScheduleEntry>>;
    /// Entries with `start <= day <= end`, ascending by day.
    fn list_range(&self, start: NaiveDate, end: NaiveDate) -> RepoResult<Vec<ScheduleEntry>>;
    /// Statistics for one meal, `None` when the meal is not in the catalog.
    fn meal_stats(&self, meal_id: MealId) -> RepoResult<Option<MealStats>>;
    /// Statistics for every catalog meal, ordered by name.
    fn summarise(&self) -> RepoResult<Vec<MealSummary>>;
}

/// SQLite-backed schedule ledger repository.
pub struct SqlitePlanRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePlanRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl PlanRepository for SqlitePlanRepository<'_> {
    fn upsert_planned_day(&self, entry: &ScheduleEntry) -> RepoResult<()> {
        let changed = self.conn.execute(
            "INSERT INTO planned_days (day, meal_uuid)
             SELECT ?1, uuid
             FROM meals
             WHERE uuid = ?2
             ON CONFLICT(day) DO UPDATE SET
                meal_uuid = excluded.meal_uuid,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![format_day(entry.day), entry.meal_id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::UnknownMeal(entry.meal_id));
        }
        Ok(())
    }

    fn delete_planned_day(&self, day: NaiveDate) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM planned_days WHERE day = ?1;",
            [format_day(day)],
        )?;
        Ok(changed > 0)
    }

    fn get_planned_day(&self, day: NaiveDate) -> RepoResult<Option<ScheduleEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT day, meal_uuid
             FROM planned_days
             WHERE day = ?1;",
        )?;
        let mut rows = stmt.query([format_day(day)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entry_row(row)?));
        }
        Ok(None)
    }

    fn list_range(&self, start: NaiveDate, end: NaiveDate) -> RepoResult<Vec<ScheduleEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT day, meal_uuid
             FROM planned_days
             WHERE day BETWEEN ?1 AND ?2
             ORDER BY day ASC;",
        )?;
        let mut rows = stmt.query([format_day(start), format_day(end)])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }

    fn meal_stats(&self, meal_id: MealId) -> RepoResult<Option<MealStats>> {
        let raw: Option<(i64, Option<String>)> = self
            .conn
            .query_row(
                "SELECT COUNT(p.day), MAX(p.day)
                 FROM meals m
                 LEFT JOIN planned_days p ON p.meal_uuid = m.uuid
                 WHERE m.uuid = ?1
                 GROUP BY m.uuid;",
                [meal_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match raw {
            Some((count, last_eaten)) => Ok(Some(build_stats(count, last_eaten)?)),
            None => Ok(None),
        }
    }

    fn summarise(&self) -> RepoResult<Vec<MealSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                m.uuid,
                m.name,
                m.kind,
                COUNT(p.day) AS eaten_count,
                MAX(p.day) AS last_eaten
             FROM meals m
             LEFT JOIN planned_days p ON p.meal_uuid = m.uuid
             GROUP BY m.uuid
             ORDER BY m.name_key ASC, m.seq ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get("uuid")?;
            let kind_text: String = row.get("kind")?;
            summaries.push(MealSummary {
                meal_id: parse_meal_id(&uuid_text)?,
                name: row.get("name")?,
                kind: parse_meal_kind(&kind_text)?,
                stats: build_stats(row.get("eaten_count")?, row.get("last_eaten")?)?,
            });
        }
        Ok(summaries)
    }
}

fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

fn parse_day(value: &str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DAY_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!("invalid day value `{value}` in planned_days.day"))
    })
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<ScheduleEntry> {
    let day_text: String = row.get("day")?;
    let uuid_text: String = row.get("meal_uuid")?;
    Ok(ScheduleEntry {
        day: parse_day(&day_text)?,
        meal_id: parse_meal_id(&uuid_text)?,
    })
}

fn build_stats(count: i64, last_eaten: Option<String>) -> RepoResult<MealStats> {
    let last_eaten = match last_eaten {
        Some(value) => Some(parse_day(&value)?),
        None => None,
    };
    Ok(MealStats {
        eaten_count: count_to_u32(count)?,
        last_eaten,
    })
}
