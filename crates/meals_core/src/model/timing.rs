//! Roast timing sheet model.
//!
//! A sheet has one target finish time and an ordered list of steps. Each
//! step is placed relative to the finish time by a non-positive minute
//! offset, e.g. `-90 Lamb in` starts ninety minutes before serving.
//!
//! # Invariants
//! - Step offsets are `<= 0`.
//! - Step descriptions are trimmed and non-empty.
//! - Step order is caller-defined and preserved.

use chrono::{Duration, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stored clock format for finish times.
pub const CLOCK_FORMAT: &str = "%H:%M:%S";

static STEP_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<offset>[+-]?\d+)\s+(?P<description>.*?\S)\s*$")
        .expect("valid timing step regex")
});

/// Validation failures for timing sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimingValidationError {
    /// Step at `position` has a blank description.
    EmptyDescription { position: usize },
    /// Step at `position` would happen after the finish time.
    OffsetAfterFinish { position: usize, offset_minutes: i32 },
    /// Step line or clock text is malformed.
    Unparseable { input: String, reason: &'static str },
}

impl Display for TimingValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDescription { position } => {
                write!(f, "timing step {position} has no description")
            }
            Self::OffsetAfterFinish {
                position,
                offset_minutes,
            } => write!(
                f,
                "timing step {position} has offset {offset_minutes}; offsets must be zero or negative"
            ),
            Self::Unparseable { input, reason } => write!(f, "cannot parse `{input}`: {reason}"),
        }
    }
}

impl Error for TimingValidationError {}

/// One step of a timing sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingStep {
    pub description: String,
    /// Minutes relative to the finish time; never positive.
    pub offset_minutes: i32,
}

impl TimingStep {
    pub fn new(description: impl Into<String>, offset_minutes: i32) -> Self {
        Self {
            description: description.into().trim().to_string(),
            offset_minutes,
        }
    }

    /// Parses an `offset description` line such as `-90 Lamb in`.
    pub fn parse(line: &str) -> Result<Self, TimingValidationError> {
        let unparseable = |reason| TimingValidationError::Unparseable {
            input: line.to_string(),
            reason,
        };
        let caps = STEP_LINE_RE
            .captures(line)
            .ok_or_else(|| unparseable("expected `offset description`"))?;
        let offset_minutes = caps["offset"]
            .parse::<i32>()
            .map_err(|_| unparseable("offset is not a whole number of minutes"))?;
        Ok(Self::new(&caps["description"], offset_minutes))
    }
}

/// A step with its wall-clock start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedStep {
    pub description: String,
    pub offset_minutes: i32,
    pub at: NaiveTime,
    /// Whole days before the finish day, `0` for the same day.
    pub days_before: i64,
}

/// The single roast timing sheet of a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    pub finish_time: NaiveTime,
    pub steps: Vec<TimingStep>,
}

impl Timings {
    pub fn new(finish_time: NaiveTime, steps: Vec<TimingStep>) -> Self {
        Self { finish_time, steps }
    }

    /// Checks sheet invariants before persistence.
    pub fn validate(&self) -> Result<(), TimingValidationError> {
        for (position, step) in self.steps.iter().enumerate() {
            if step.description.trim().is_empty() {
                return Err(TimingValidationError::EmptyDescription { position });
            }
            if step.offset_minutes > 0 {
                return Err(TimingValidationError::OffsetAfterFinish {
                    position,
                    offset_minutes: step.offset_minutes,
                });
            }
        }
        Ok(())
    }

    /// Start time of every step, in sheet order.
    pub fn schedule(&self) -> Vec<TimedStep> {
        self.steps
            .iter()
            .map(|step| {
                let (at, wrapped_secs) = self
                    .finish_time
                    .overflowing_add_signed(Duration::minutes(i64::from(step.offset_minutes)));
                TimedStep {
                    description: step.description.clone(),
                    offset_minutes: step.offset_minutes,
                    at,
                    days_before: -wrapped_secs.div_euclid(SECONDS_PER_DAY),
                }
            })
            .collect()
    }
}

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Parses `HH:MM` or `HH:MM:SS` clock text.
pub fn parse_clock_time(value: &str) -> Result<NaiveTime, TimingValidationError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, CLOCK_FORMAT))
        .map_err(|_| TimingValidationError::Unparseable {
            input: value.to_string(),
            reason: "expected HH:MM",
        })
}
