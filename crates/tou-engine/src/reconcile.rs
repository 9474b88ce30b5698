//! Anchor reconciliation -- fold utility-dispatched windows into the fixed off-peak window.
//!
//! The tariff always has a nightly off-peak anchor window (23:30 → 05:30 by
//! default). Dispatched windows are dropped once elapsed, clipped so they never
//! re-cover the anchor, and merged with their neighbours. The anchor window is
//! appended whenever no dispatched window already spans it.

use crate::category::Category;
use crate::error::{Result, ScheduleError};
use crate::interval::TimeInterval;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use tracing::debug;

/// The fixed daily off-peak window, possibly crossing midnight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorWindow {
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    interval: TimeInterval,
}

impl AnchorWindow {
    /// Anchor window starting at `start` on `date` in `tz`.
    ///
    /// If `end` is not later than `start` on the clock, the window ends on the
    /// following day. Ambiguous local times (DST fall-back) resolve to the earlier
    /// instant.
    ///
    /// # Errors
    /// Returns `ScheduleError::Config` if either boundary falls in a DST gap or
    /// the window would be empty.
    pub fn for_day(date: NaiveDate, start: NaiveTime, end: NaiveTime, tz: &Tz) -> Result<Self> {
        let end_date = if end <= start {
            date.succ_opt().ok_or_else(|| {
                ScheduleError::Config(format!("anchor window cannot start on {}", date))
            })?
        } else {
            date
        };
        let start = local_instant(tz, date, start)?;
        let end = local_instant(tz, end_date, end)?;
        let interval = TimeInterval::new(start, end, Category::OffPeak)
            .map_err(|e| ScheduleError::Config(format!("anchor window: {}", e)))?;
        Ok(Self {
            start,
            end,
            interval,
        })
    }

    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    pub fn end(&self) -> DateTime<Tz> {
        self.end
    }

    /// The window itself as an off-peak interval.
    pub fn to_interval(&self) -> TimeInterval {
        self.interval
    }

    fn contains(&self, instant: DateTime<Tz>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

fn local_instant(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Tz>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .ok_or_else(|| {
            ScheduleError::Config(format!(
                "anchor time {} does not exist on {} in {}",
                time, date, tz
            ))
        })
}

/// Produce the ordered off-peak intervals to paint for the day.
///
/// 1. Dispatched intervals with `end <= now` are discarded.
/// 2. Intervals overlapping one edge of the anchor are clipped to that edge;
///    intervals fully inside the anchor are dropped.
/// 3. The anchor window is appended unless some dispatched interval spans it.
/// 4. Intervals are sorted and adjacent or overlapping neighbours merged.
pub fn reconcile(
    anchor: &AnchorWindow,
    dispatched: &[TimeInterval],
    now: DateTime<Tz>,
) -> Vec<TimeInterval> {
    let mut intervals = Vec::with_capacity(dispatched.len() + 1);
    let mut anchor_covered = false;

    for interval in dispatched.iter().filter(|i| i.end() > now) {
        let (start, end) = (interval.start(), interval.end());

        if anchor.contains(start) && anchor.contains(end) {
            debug!(%start, %end, "dispatch inside anchor window, dropping");
            continue;
        }

        let clipped = if start <= anchor.start && anchor.end <= end {
            anchor_covered = true;
            *interval
        } else if start <= anchor.start && anchor.start < end && end <= anchor.end {
            interval.with_end(anchor.start)
        } else if anchor.contains(start) && anchor.end < end {
            interval.with_start(anchor.end)
        } else {
            *interval
        };
        intervals.push(clipped);
    }

    if !anchor_covered {
        intervals.push(anchor.to_interval());
    }

    merge_adjacent(intervals)
}

/// Sort by start and merge every pair where one interval ends at or after the
/// next one's start.
fn merge_adjacent(mut intervals: Vec<TimeInterval>) -> Vec<TimeInterval> {
    intervals.sort_by_key(|i| (i.start(), i.end()));

    let mut merged: Vec<TimeInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        if let Some(last) = merged.last_mut() {
            if interval.start() <= last.end() {
                *last = last.with_end(last.end().max(interval.end()));
                continue;
            }
        }
        merged.push(interval);
    }

    merged
}
