//! Configuration -- `KEY value` files and the immutable [`ScheduleConfig`].
//!
//! The configuration file has one `KEY value` pair per line. Lines starting with
//! `#` and blank lines are ignored; a repeated key keeps its last value. The file
//! is parsed once at startup into [`KeyValues`], and the schedule-related keys
//! are then lifted into a [`ScheduleConfig`] that every pipeline stage borrows.

use crate::category::{Rate, RateTable};
use crate::document::TariffIdentity;
use crate::error::{Result, ScheduleError};
use crate::publish::PublishOptions;
use chrono::NaiveTime;
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// Raw `KEY value` pairs from a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValues {
    entries: BTreeMap<String, String>,
}

impl FromStr for KeyValues {
    type Err = ScheduleError;

    fn from_str(text: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once(char::is_whitespace)
                .map(|(key, value)| (key, value.trim()))
                .ok_or_else(|| {
                    ScheduleError::Config(format!("line {}: key {} has no value", number + 1, line))
                })?;
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(Self { entries })
    }
}

impl KeyValues {
    /// Read and parse a configuration file.
    ///
    /// # Errors
    /// Returns `ScheduleError::Config` if the file cannot be read or a line has a
    /// key without a value.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ScheduleError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        text.parse()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// A value that must be present and not a template placeholder.
    ///
    /// # Errors
    /// Returns `ScheduleError::Config` naming the key if it is absent or still
    /// holds the `XXXXXXXX` placeholder from the generated template.
    pub fn required(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(value) if !is_placeholder(value) => Ok(value),
            Some(_) => Err(ScheduleError::Config(format!(
                "{} still has its placeholder value",
                key
            ))),
            None => Err(ScheduleError::Config(format!(
                "missing required configuration key {}",
                key
            ))),
        }
    }

    pub fn decimal(&self, key: &str, default: f64) -> Result<f64> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| invalid(key, raw, "a decimal number")),
        }
    }

    pub fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => parse_flag(raw).ok_or_else(|| invalid(key, raw, "True or False")),
        }
    }

    pub fn port(&self, key: &str, default: u16) -> Result<u16> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<u16>()
                .ok()
                .filter(|&port| port != 0)
                .ok_or_else(|| invalid(key, raw, "a port number")),
        }
    }

    pub fn time_of_day(&self, key: &str, default: NaiveTime) -> Result<NaiveTime> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => NaiveTime::parse_from_str(raw, "%H:%M")
                .map_err(|_| invalid(key, raw, "a time as HH:MM")),
        }
    }

    pub fn timezone(&self, key: &str, default: Tz) -> Result<Tz> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<Tz>()
                .map_err(|_| invalid(key, raw, "an IANA timezone")),
        }
    }
}

fn is_placeholder(value: &str) -> bool {
    value.contains("XXXXXXXX")
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(key: &str, raw: &str, expected: &str) -> ScheduleError {
    ScheduleError::Config(format!("{} = '{}' is not {}", key, raw, expected))
}

/// Everything the schedule pipeline needs, fixed for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub timezone: Tz,
    /// Local start of the nightly off-peak anchor window.
    pub anchor_start: NaiveTime,
    /// Local end of the anchor window; earlier than `anchor_start` means next day.
    pub anchor_end: NaiveTime,
    pub rates: RateTable,
    /// Margin a savings session's export rate must beat above on-peak export.
    pub savings_min_offset: f64,
    /// Reward points per unit of currency, used to price savings sessions.
    pub savings_points_per_unit: f64,
    pub participate_free: bool,
    pub participate_savings: bool,
    pub force_update: bool,
    pub read_only: bool,
    pub tariff: TariffIdentity,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::London,
            anchor_start: hm(23, 30),
            anchor_end: hm(5, 30),
            rates: RateTable::default(),
            savings_min_offset: 0.0,
            savings_points_per_unit: 800.0,
            participate_free: true,
            participate_savings: false,
            force_update: false,
            read_only: false,
            tariff: TariffIdentity::default(),
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl ScheduleConfig {
    /// Lift the schedule keys out of a parsed configuration file, falling back
    /// to the defaults for anything absent.
    ///
    /// # Errors
    /// Returns `ScheduleError::Config` for malformed values or a non-positive
    /// `SAVINGS_POINTS_PER_UNIT`.
    pub fn from_key_values(kv: &KeyValues) -> Result<Self> {
        let defaults = Self::default();
        let rates = RateTable {
            off_peak: Rate::new(
                kv.decimal("OFFPEAK_RATE", defaults.rates.off_peak.buy)?,
                kv.decimal("OFFPEAK_SELL_RATE", defaults.rates.off_peak.sell)?,
            ),
            on_peak: Rate::new(
                kv.decimal("ONPEAK_RATE", defaults.rates.on_peak.buy)?,
                kv.decimal("ONPEAK_SELL_RATE", defaults.rates.on_peak.sell)?,
            ),
            ..defaults.rates
        };

        let savings_points_per_unit =
            kv.decimal("SAVINGS_POINTS_PER_UNIT", defaults.savings_points_per_unit)?;
        if savings_points_per_unit <= 0.0 {
            return Err(invalid(
                "SAVINGS_POINTS_PER_UNIT",
                &savings_points_per_unit.to_string(),
                "a positive number",
            ));
        }

        Ok(Self {
            timezone: kv.timezone("TIMEZONE", defaults.timezone)?,
            anchor_start: kv.time_of_day("ANCHOR_START", defaults.anchor_start)?,
            anchor_end: kv.time_of_day("ANCHOR_END", defaults.anchor_end)?,
            rates,
            savings_min_offset: kv.decimal("SAVINGS_MIN_OFFSET", defaults.savings_min_offset)?,
            savings_points_per_unit,
            participate_free: kv.flag("FREE_ELECTRIC", defaults.participate_free)?,
            participate_savings: kv.flag("SAVINGS_SESSIONS", defaults.participate_savings)?,
            force_update: kv.flag("FORCE_UPDATE", defaults.force_update)?,
            read_only: kv.flag("READONLY", defaults.read_only)?,
            tariff: TariffIdentity {
                name: kv
                    .get("TARIFF_NAME")
                    .map(str::to_string)
                    .unwrap_or(defaults.tariff.name),
                utility: kv
                    .get("TARIFF_UTILITY")
                    .map(str::to_string)
                    .unwrap_or(defaults.tariff.utility),
            },
        })
    }

    pub fn publish_options(&self) -> PublishOptions {
        PublishOptions {
            force: self.force_update,
            read_only: self.read_only,
        }
    }
}
