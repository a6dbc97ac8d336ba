//! Roast timing sheet repository contracts and SQLite implementation.
//!
//! # Invariants
//! - At most one sheet exists (`timings.id = 1`).
//! - The sheet row and its steps are written in one immediate transaction.
//! - Steps are read back in stored `position` order.

use crate::model::timing::{TimingStep, Timings, CLOCK_FORMAT};
use crate::repo::ensure_connection_ready;
use crate::repo::meal_repo::{RepoError, RepoResult};
use chrono::NaiveTime;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

const SHEET_ID: i64 = 1;
const REQUIRED_TABLES: &[&str] = &["timings", "timing_steps"];

/// Repository interface for the roast timing sheet.
pub trait TimingRepository {
    /// Stores the first sheet; fails with `TimingsAlreadyExist` otherwise.
    fn create_timings(&self, timings: &Timings) -> RepoResult<()>;
    fn get_timings(&self) -> RepoResult<Option<Timings>>;
    /// Creates or replaces the sheet. Returns `true` when it was created.
    fn upsert_timings(&self, timings: &Timings) -> RepoResult<bool>;
}

/// SQLite-backed timing sheet repository.
pub struct SqliteTimingRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTimingRepository<'conn> {
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

impl TimingRepository for SqliteTimingRepository<'_> {
    fn create_timings(&self, timings: &Timings) -> RepoResult<()> {
        timings.validate()?;

        let tx = self.begin_write()?;
        if sheet_exists(&tx)? {
            return Err(RepoError::TimingsAlreadyExist);
        }
        tx.execute(
            "INSERT INTO timings (id, finish_time) VALUES (?1, ?2);",
            params![SHEET_ID, format_clock(timings.finish_time)],
        )?;
        write_steps(&tx, &timings.steps)?;
        tx.commit()?;
        Ok(())
    }

    fn get_timings(&self) -> RepoResult<Option<Timings>> {
        let finish_text: Option<String> = self
            .conn
            .query_row(
                "SELECT finish_time FROM timings WHERE id = ?1;",
                [SHEET_ID],
                |row| row.get(0),
            )
            .optional()?;
        let Some(finish_text) = finish_text else {
            return Ok(None);
        };

        let timings = Timings::new(parse_clock(&finish_text)?, load_steps(self.conn)?);
        timings
            .validate()
            .map_err(|err| RepoError::InvalidData(format!("timing sheet: {err}")))?;
        Ok(Some(timings))
    }

    fn upsert_timings(&self, timings: &Timings) -> RepoResult<bool> {
        timings.validate()?;

        let tx = self.begin_write()?;
        let created = !sheet_exists(&tx)?;
        tx.execute(
            "INSERT INTO timings (id, finish_time) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                finish_time = excluded.finish_time,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![SHEET_ID, format_clock(timings.finish_time)],
        )?;
        write_steps(&tx, &timings.steps)?;
        tx.commit()?;
        Ok(created)
    }
}

fn sheet_exists(conn: &Connection) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM timings WHERE id = ?1);",
        [SHEET_ID],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn write_steps(conn: &Connection, steps: &[TimingStep]) -> RepoResult<()> {
    conn.execute(
        "DELETE FROM timing_steps WHERE timings_id = ?1;",
        [SHEET_ID],
    )?;
    for (position, step) in steps.iter().enumerate() {
        conn.execute(
            "INSERT INTO timing_steps (timings_id, position, description, offset_minutes)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                SHEET_ID,
                position as i64,
                step.description.as_str(),
                step.offset_minutes,
            ],
        )?;
    }
    Ok(())
}

fn load_steps(conn: &Connection) -> RepoResult<Vec<TimingStep>> {
    let mut stmt = conn.prepare(
        "SELECT description, offset_minutes
         FROM timing_steps
         WHERE timings_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([SHEET_ID])?;
    let mut steps = Vec::new();
    while let Some(row) = rows.next()? {
        steps.push(TimingStep {
            description: row.get(0)?,
            offset_minutes: row.get(1)?,
        });
    }
    Ok(steps)
}

fn format_clock(time: NaiveTime) -> String {
    time.format(CLOCK_FORMAT).to_string()
}

fn parse_clock(value: &str) -> RepoResult<NaiveTime> {
    NaiveTime::parse_from_str(value, CLOCK_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!("invalid clock value `{value}` in timings.finish_time"))
    })
}
