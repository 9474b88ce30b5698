//! # tou-engine
//!
//! Deterministic time-of-use schedule synthesis for home battery controllers.
//!
//! Several independently sourced pricing windows (a fixed nightly off-peak
//! window, windows dispatched by the utility, savings sessions and
//! free-electricity sessions) are reconciled into one gap-free schedule at
//! 30-minute resolution. The schedule is serialized into the controller's
//! tariff document and only published when its fingerprint has changed.
//!
//! ## Modules
//!
//! - [`interval`] - raw timestamps → local-time [`TimeInterval`]s
//! - [`reconcile`] - clip dispatched windows against the anchor window and merge
//! - [`grid`] - the 48-cell daily [`SlotGrid`] and its painting rules
//! - [`encoder`] - grid → [`ScheduleBlock`]s → [`ScheduleDocument`]
//! - [`document`] - controller tariff document built from a schedule
//! - [`publish`] - fingerprinting, persisted [`PublishState`] and the publish gate
//! - [`pipeline`] - one end-to-end run over already-fetched inputs
//! - [`config`] - `KEY value` configuration parsing and [`ScheduleConfig`]
//! - [`category`] - pricing categories and their rates
//! - [`error`] - Error types

pub mod category;
pub mod config;
pub mod document;
pub mod encoder;
pub mod error;
pub mod grid;
pub mod interval;
pub mod pipeline;
pub mod publish;
pub mod reconcile;

pub use category::{Category, Rate, RateTable};
pub use config::{KeyValues, ScheduleConfig};
pub use document::{TariffDocument, TariffIdentity};
pub use encoder::{encode_blocks, ScheduleBlock, ScheduleDocument};
pub use error::ScheduleError;
pub use grid::SlotGrid;
pub use interval::{normalize, normalize_all, RawInterval, Source, TimeInterval};
pub use pipeline::{build_schedule, run, RunReport, SavingsSession, Schedule, ScheduleInputs};
pub use publish::{
    fingerprint, publish_if_changed, FileStateStore, PublishDecision, PublishOptions,
    PublishOutcome, PublishState, Publisher, StateStore,
};
pub use reconcile::{reconcile, AnchorWindow};
