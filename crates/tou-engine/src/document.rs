//! Controller tariff document -- the JSON body sent to the battery controller.
//!
//! The controller expects a `tou_settings.tariff_content_v2` object with a buy
//! tariff and a nested `sell_tariff`. Both share the same time-of-use periods and
//! differ only in rates. Only a single all-year season is used, and every period
//! applies to every day of the week.
//!
//! The document is built as typed data and serialized once with `serde_json`.
//! Field order is fixed by declaration and maps are `BTreeMap`s, so the same
//! schedule always yields byte-identical output.

use crate::category::{Category, Rate};
use crate::encoder::{ScheduleBlock, ScheduleDocument};
use crate::error::{Result, ScheduleError};
use serde::Serialize;
use std::collections::BTreeMap;

const SEASON_NAME: &str = "Summer";
const UNUSED_SEASON_NAME: &str = "Winter";
const ALL: &str = "ALL";

/// Top-level request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffDocument {
    pub tou_settings: TouSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TouSettings {
    pub tariff_content_v2: BuyTariff,
}

/// The import tariff, carrying the export tariff alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuyTariff {
    #[serde(flatten)]
    pub content: TariffContent,
    pub sell_tariff: TariffContent,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffContent {
    pub name: String,
    pub utility: String,
    pub daily_charges: Vec<DailyCharge>,
    pub demand_charges: BTreeMap<&'static str, SeasonCharges>,
    pub energy_charges: BTreeMap<&'static str, SeasonCharges>,
    pub seasons: BTreeMap<&'static str, Season>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCharge {
    pub name: String,
}

/// Rates for one season, keyed by period name. Empty seasons serialize as `{}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SeasonCharges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rates: Option<BTreeMap<&'static str, f64>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Season {
    #[serde(flatten)]
    pub window: Option<SeasonWindow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonWindow {
    pub from_day: u32,
    pub to_day: u32,
    pub from_month: u32,
    pub to_month: u32,
    #[serde(rename = "tou_periods")]
    pub tou_periods: BTreeMap<&'static str, PeriodList>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodList {
    pub periods: Vec<Period>,
}

/// One time-of-use block. Day 0 to 6 means every day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub from_day_of_week: u32,
    pub to_day_of_week: u32,
    pub from_hour: u32,
    pub from_minute: u32,
    pub to_hour: u32,
    pub to_minute: u32,
}

impl From<&ScheduleBlock> for Period {
    fn from(block: &ScheduleBlock) -> Self {
        Self {
            from_day_of_week: 0,
            to_day_of_week: 6,
            from_hour: block.start_hour,
            from_minute: block.start_minute,
            to_hour: block.end_hour,
            to_minute: block.end_minute,
        }
    }
}

/// Name and utility reported to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffIdentity {
    pub name: String,
    pub utility: String,
}

impl Default for TariffIdentity {
    fn default() -> Self {
        Self {
            name: "Intelligent Octopus Go".to_string(),
            utility: "Octopus".to_string(),
        }
    }
}

impl TariffDocument {
    /// Build the request body for `schedule`.
    pub fn new(schedule: &ScheduleDocument, identity: &TariffIdentity) -> Self {
        let periods: BTreeMap<&'static str, PeriodList> = schedule
            .categories()
            .map(|category| {
                let periods = schedule.blocks(category).iter().map(Period::from).collect();
                (category.period_name(), PeriodList { periods })
            })
            .collect();

        let buy = tariff_content(identity, &periods, |rate| rate.buy, schedule);
        let sell = tariff_content(identity, &periods, |rate| rate.sell, schedule);

        Self {
            tou_settings: TouSettings {
                tariff_content_v2: BuyTariff {
                    content: buy,
                    sell_tariff: sell,
                    version: 1,
                },
            },
        }
    }

    /// Canonical serialization. Identical schedules give identical bytes.
    pub fn to_canonical_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| ScheduleError::Publish(format!("tariff document serialization: {}", e)))
    }
}

fn tariff_content(
    identity: &TariffIdentity,
    periods: &BTreeMap<&'static str, PeriodList>,
    pick: impl Fn(Rate) -> f64,
    schedule: &ScheduleDocument,
) -> TariffContent {
    let rates: BTreeMap<&'static str, f64> = Category::ALL
        .iter()
        .map(|&category| (category.period_name(), pick(schedule.rates.get(category))))
        .collect();

    let flat = SeasonCharges {
        rates: Some(BTreeMap::from([(ALL, 0.0)])),
    };

    TariffContent {
        name: identity.name.clone(),
        utility: identity.utility.clone(),
        daily_charges: vec![DailyCharge {
            name: "Charge".to_string(),
        }],
        demand_charges: BTreeMap::from([
            (ALL, flat.clone()),
            (SEASON_NAME, SeasonCharges::default()),
            (UNUSED_SEASON_NAME, SeasonCharges::default()),
        ]),
        energy_charges: BTreeMap::from([
            (ALL, flat),
            (SEASON_NAME, SeasonCharges { rates: Some(rates) }),
            (UNUSED_SEASON_NAME, SeasonCharges::default()),
        ]),
        seasons: BTreeMap::from([
            (
                SEASON_NAME,
                Season {
                    window: Some(SeasonWindow {
                        from_day: 1,
                        to_day: 31,
                        from_month: 1,
                        to_month: 12,
                        tou_periods: periods.clone(),
                    }),
                },
            ),
            (UNUSED_SEASON_NAME, Season::default()),
        ]),
    }
}
