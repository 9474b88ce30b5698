//! Interval normalization -- converts raw upstream timestamps into local-time intervals.
//!
//! Every source (utility dispatches, savings sessions, free-electricity sessions)
//! hands over `startDt`/`endDt` strings with a UTC or local offset. They are parsed
//! here and converted to the single configured timezone before any reconciliation.

use crate::category::Category;
use crate::error::{Result, ScheduleError};
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Which collaborator produced an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Off-peak window dispatched by the utility.
    Dispatch,
    /// Savings (export) session.
    Savings,
    /// Free-electricity session.
    Free,
}

impl Source {
    /// The category cells are painted with for intervals from this source.
    pub fn category(self) -> Category {
        match self {
            Source::Dispatch => Category::OffPeak,
            Source::Savings => Category::Savings,
            Source::Free => Category::Free,
        }
    }
}

/// An interval exactly as an upstream source reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInterval {
    #[serde(rename = "startDt")]
    pub start_dt: String,
    #[serde(rename = "endDt")]
    pub end_dt: String,
}

impl RawInterval {
    pub fn new(start_dt: impl Into<String>, end_dt: impl Into<String>) -> Self {
        Self {
            start_dt: start_dt.into(),
            end_dt: end_dt.into(),
        }
    }
}

/// A categorized, non-empty span of time in the configured local timezone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeInterval {
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    category: Category,
}

impl TimeInterval {
    /// Build an interval.
    ///
    /// # Errors
    /// Returns `ScheduleError::Parse` if `end` is not after `start`.
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>, category: Category) -> Result<Self> {
        if end <= start {
            return Err(ScheduleError::Parse(format!(
                "interval end {} is not after start {}",
                end, start
            )));
        }
        Ok(Self {
            start,
            end,
            category,
        })
    }

    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    pub fn end(&self) -> DateTime<Tz> {
        self.end
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Same interval with a different end. Callers keep `end > start`.
    pub(crate) fn with_end(self, end: DateTime<Tz>) -> Self {
        Self { end, ..self }
    }

    /// Same interval with a different start. Callers keep `start < end`.
    pub(crate) fn with_start(self, start: DateTime<Tz>) -> Self {
        Self { start, ..self }
    }
}

/// Parse an ISO-8601 timestamp with offset and convert it to `tz`.
///
/// Accepts RFC 3339 (`2024-11-22T23:30:00Z`, `2024-11-22T23:30:00+00:00`) and the
/// space-separated form the utility API returns (`2024-11-22 23:30:00+00:00`).
///
/// # Errors
/// Returns `ScheduleError::Parse` if the string matches none of the accepted forms.
pub fn parse_timestamp(value: &str, tz: &Tz) -> Result<DateTime<Tz>> {
    let trimmed = value.trim();
    let parsed: DateTime<FixedOffset> = DateTime::parse_from_rfc3339(trimmed)
        .or_else(|_| DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%z"))
        .or_else(|_| DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%z"))
        .map_err(|e| ScheduleError::Parse(format!("invalid timestamp '{}': {}", value, e)))?;
    Ok(parsed.with_timezone(tz))
}

/// Normalize one raw interval into the configured timezone.
///
/// # Errors
/// Returns `ScheduleError::Parse` if either timestamp is malformed or the
/// interval is empty or inverted.
pub fn normalize(raw: &RawInterval, source: Source, tz: &Tz) -> Result<TimeInterval> {
    let start = parse_timestamp(&raw.start_dt, tz)?;
    let end = parse_timestamp(&raw.end_dt, tz)?;
    TimeInterval::new(start, end, source.category())
}

/// Normalize every interval from one source.
///
/// # Errors
/// Fails on the first malformed entry.
pub fn normalize_all(raws: &[RawInterval], source: Source, tz: &Tz) -> Result<Vec<TimeInterval>> {
    raws.iter().map(|raw| normalize(raw, source, tz)).collect()
}
