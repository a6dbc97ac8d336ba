//! Roast timing sheet use-case service.
//!
//! # Responsibility
//! - Create, read and replace the single timing sheet.
//! - Turn step offsets into wall-clock start times.

use crate::model::timing::{TimedStep, TimingValidationError, Timings};
use crate::repo::meal_repo::{RepoError, RepoResult};
use crate::repo::timing_repo::TimingRepository;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for timing use-cases.
#[derive(Debug)]
pub enum TimingServiceError {
    /// `create` was called while a sheet is already stored.
    AlreadyExists,
    /// Sheet fails validation (positive offset, blank step).
    Invalid(TimingValidationError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for TimingServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "a timing sheet already exists"),
            Self::Invalid(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TimingServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::AlreadyExists => None,
        }
    }
}

impl From<RepoError> for TimingServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::TimingsAlreadyExist => Self::AlreadyExists,
            RepoError::TimingValidation(err) => Self::Invalid(err),
            other => Self::Repo(other),
        }
    }
}

impl From<TimingValidationError> for TimingServiceError {
    fn from(value: TimingValidationError) -> Self {
        Self::Invalid(value)
    }
}

pub type TimingResult<T> = Result<T, TimingServiceError>;

/// Timing service facade over repository implementations.
pub struct TimingService<R: TimingRepository> {
    repo: R,
}

impl<R: TimingRepository> TimingService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Stores the first timing sheet.
    ///
    /// # Errors
    /// - `AlreadyExists` when a sheet is stored; use [`Self::save`] to replace it.
    /// - `Invalid` when a step has a positive offset or no description.
    pub fn create(&self, timings: &Timings) -> TimingResult<()> {
        timings.validate()?;
        self.repo.create_timings(timings)?;
        info!(
            "event=timings_create module=timings status=ok step_count={}",
            timings.steps.len()
        );
        Ok(())
    }

    pub fn get(&self) -> RepoResult<Option<Timings>> {
        self.repo.get_timings()
    }

    /// Creates or replaces the sheet. Returns `true` when it was created.
    pub fn save(&self, timings: &Timings) -> TimingResult<bool> {
        timings.validate()?;
        let created = self.repo.upsert_timings(timings)?;
        info!(
            "event=timings_save module=timings status=ok created={} step_count={}",
            created,
            timings.steps.len()
        );
        Ok(created)
    }

    /// Start times of the stored sheet, `None` when no sheet exists.
    pub fn schedule(&self) -> RepoResult<Option<(Timings, Vec<TimedStep>)>> {
        Ok(self.repo.get_timings()?.map(|timings| {
            let steps = timings.schedule();
            (timings, steps)
        }))
    }
}
