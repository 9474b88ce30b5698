//! Pricing categories and the buy/sell rate attached to each.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The pricing category of a schedule cell.
///
/// Variant order is the order categories appear in the published document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Category {
    OffPeak,
    #[default]
    OnPeak,
    Free,
    Savings,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::OffPeak,
        Category::OnPeak,
        Category::Free,
        Category::Savings,
    ];

    /// Period name understood by the battery controller's tariff format.
    pub fn period_name(self) -> &'static str {
        match self {
            Category::OffPeak => "OFF_PEAK",
            Category::OnPeak => "ON_PEAK",
            Category::Free => "SUPER_OFF_PEAK",
            Category::Savings => "MID_PEAK",
        }
    }

    /// Human-readable label used in status output.
    pub fn label(self) -> &'static str {
        match self {
            Category::OffPeak => "Off Peak",
            Category::OnPeak => "On Peak",
            Category::Free => "Free Session",
            Category::Savings => "Saving Session",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Import (buy) and export (sell) price in currency per kWh.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rate {
    pub buy: f64,
    pub sell: f64,
}

impl Rate {
    pub fn new(buy: f64, sell: f64) -> Self {
        Self { buy, sell }
    }
}

/// One [`Rate`] per [`Category`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub off_peak: Rate,
    pub on_peak: Rate,
    pub free: Rate,
    pub savings: Rate,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            off_peak: Rate::new(0.07, 0.00),
            on_peak: Rate::new(0.25, 0.15),
            free: Rate::default(),
            savings: Rate::default(),
        }
    }
}

impl RateTable {
    pub fn get(&self, category: Category) -> Rate {
        match category {
            Category::OffPeak => self.off_peak,
            Category::OnPeak => self.on_peak,
            Category::Free => self.free,
            Category::Savings => self.savings,
        }
    }

    /// Returns a copy with the savings import and export rate both set to
    /// `export_rate`. The controller rejects export rates above import.
    pub fn with_savings_rate(mut self, export_rate: f64) -> Self {
        self.savings = Rate::new(export_rate, export_rate);
        self
    }
}
