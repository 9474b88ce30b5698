//! One schedule run over already-fetched inputs.
//!
//! Painting order is fixed: reconciled off-peak windows first, then an eligible
//! savings session, then an eligible free-electricity session. Later layers
//! overwrite earlier ones, so the rare premium windows always win the cells
//! they occupy.

use crate::category::Category;
use crate::config::ScheduleConfig;
use crate::document::TariffDocument;
use crate::encoder::{encode_blocks, ScheduleBlock, ScheduleDocument};
use crate::error::Result;
use crate::grid::SlotGrid;
use crate::interval::TimeInterval;
use crate::publish::{fingerprint, publish_if_changed, PublishOutcome, Publisher, StateStore};
use crate::reconcile::{reconcile, AnchorWindow};
use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{debug, info};

/// A savings session offered by the utility for today.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavingsSession {
    pub interval: TimeInterval,
    /// Offered export price in currency per kWh.
    pub export_rate: f64,
}

impl SavingsSession {
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>, export_rate: f64) -> Result<Self> {
        Ok(Self {
            interval: TimeInterval::new(start, end, Category::Savings)?,
            export_rate,
        })
    }
}

/// Everything fetched for one run, already normalized to local time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleInputs {
    /// Off-peak windows dispatched by the utility.
    pub dispatches: Vec<TimeInterval>,
    pub savings: Option<SavingsSession>,
    pub free: Option<TimeInterval>,
}

/// The computed schedule and its serialized, fingerprinted form.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub off_peak: Vec<TimeInterval>,
    pub grid: SlotGrid,
    pub blocks: Vec<ScheduleBlock>,
    pub document: ScheduleDocument,
    /// Canonical JSON body for the controller.
    pub payload: String,
    pub fingerprint: String,
}

/// A completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub schedule: Schedule,
    pub outcome: PublishOutcome,
}

/// Whether a savings session is worth painting.
pub fn savings_eligible(config: &ScheduleConfig, session: &SavingsSession) -> bool {
    let threshold = config.rates.on_peak.sell + config.savings_min_offset;
    config.participate_savings && session.export_rate > threshold
}

/// Whether a free-electricity session applies to the rest of today.
pub fn free_eligible(config: &ScheduleConfig, session: &TimeInterval, now: DateTime<Tz>) -> bool {
    config.participate_free
        && session.end() > now
        && session.end().date_naive() == now.date_naive()
}

/// Paint the grid in the fixed application order.
pub fn paint_grid(
    config: &ScheduleConfig,
    off_peak: &[TimeInterval],
    savings: Option<&SavingsSession>,
    free: Option<&TimeInterval>,
    now: DateTime<Tz>,
) -> SlotGrid {
    let mut grid = SlotGrid::new();

    for interval in off_peak {
        grid.fill_slots(Category::OffPeak, &interval.start(), &interval.end());
    }

    if let Some(session) = savings {
        if savings_eligible(config, session) {
            info!(rate = session.export_rate, "adding savings session");
            let interval = &session.interval;
            grid.fill_slots(Category::Savings, &interval.start(), &interval.end());
        } else {
            debug!(rate = session.export_rate, "savings session not eligible");
        }
    }

    if let Some(session) = free {
        if free_eligible(config, session, now) {
            info!(start = %session.start(), end = %session.end(), "adding free electricity session");
            grid.fill_slots(Category::Free, &session.start(), &session.end());
        } else {
            debug!(start = %session.start(), end = %session.end(), "free electricity session not eligible");
        }
    }

    grid
}

/// Compute today's schedule from fetched inputs.
///
/// # Errors
/// Returns `ScheduleError::Config` if the anchor window cannot be placed on
/// today's date in the configured timezone.
pub fn build_schedule(
    config: &ScheduleConfig,
    inputs: &ScheduleInputs,
    now: DateTime<Tz>,
) -> Result<Schedule> {
    let now = now.with_timezone(&config.timezone);
    let anchor = AnchorWindow::for_day(
        now.date_naive(),
        config.anchor_start,
        config.anchor_end,
        &config.timezone,
    )?;
    let off_peak = reconcile(&anchor, &inputs.dispatches, now);
    debug!(count = off_peak.len(), "reconciled off-peak intervals");

    let grid = paint_grid(
        config,
        &off_peak,
        inputs.savings.as_ref(),
        inputs.free.as_ref(),
        now,
    );
    let blocks = encode_blocks(&grid);
    for block in &blocks {
        debug!("{}", block);
    }

    let rates = match inputs.savings {
        Some(session) if grid.cells().contains(&Category::Savings) => {
            config.rates.with_savings_rate(session.export_rate)
        }
        _ => config.rates,
    };
    let document = ScheduleDocument::from_blocks(&blocks, rates);
    let payload = TariffDocument::new(&document, &config.tariff).to_canonical_json()?;
    let fingerprint = fingerprint(&payload);

    Ok(Schedule {
        off_peak,
        grid,
        blocks,
        document,
        payload,
        fingerprint,
    })
}

/// Build the schedule and publish it if it changed since the last publish.
///
/// # Errors
/// Propagates errors from [`build_schedule`], the state store and the
/// publisher. A failed publish leaves the stored fingerprint untouched.
pub fn run<S, P>(
    config: &ScheduleConfig,
    inputs: &ScheduleInputs,
    now: DateTime<Tz>,
    store: &S,
    publisher: &P,
) -> Result<RunReport>
where
    S: StateStore + ?Sized,
    P: Publisher + ?Sized,
{
    let schedule = build_schedule(config, inputs, now)?;
    let outcome = publish_if_changed(
        &schedule.payload,
        store,
        publisher,
        config.publish_options(),
    )?;
    Ok(RunReport { schedule, outcome })
}
