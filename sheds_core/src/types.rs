//! Core domain types for the shed manager.
//!
//! This module defines the fundamental types used throughout the system:
//! - Gas states, oxygen banks and blend actions
//! - Compressor runtime records
//! - Loan, nitrox fill and role records
//! - Inventory sheets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Oxygen fraction of air, used for top-off
pub const AIR_MIX: f64 = 0.209;

/// Oxygen fraction of bank gas
pub const OXYGEN_MIX: f64 = 1.0;

// ============================================================================
// Gas Types
// ============================================================================

/// Gas content of a cylinder at one instant.
///
/// States are never mutated; every blend step derives a new one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GasState {
    pub pressure_bar: f64,
    /// Fraction of O2, 0..=1
    pub mix: f64,
    pub volume_litres: f64,
}

impl GasState {
    pub fn new(pressure_bar: f64, mix: f64, volume_litres: f64) -> Self {
        Self {
            pressure_bar,
            mix,
            volume_litres,
        }
    }

    /// O2 partial pressure (Dalton's law)
    pub fn o2_partial_pressure(&self) -> f64 {
        self.pressure_bar * self.mix
    }

    /// Free gas volume at 1 bar
    pub fn free_litres(&self) -> f64 {
        self.pressure_bar * self.volume_litres
    }

    /// State after venting down to `pressure_bar`; the mix is unchanged.
    pub fn bled_to(&self, pressure_bar: f64) -> Self {
        Self {
            pressure_bar: pressure_bar.max(0.0),
            ..*self
        }
    }

    /// State after adding `added_bar` of gas with O2 fraction `mix`.
    pub fn with_added(&self, added_bar: f64, mix: f64) -> Self {
        let pressure = self.pressure_bar + added_bar;
        let new_mix = if pressure > 0.0 {
            (self.o2_partial_pressure() + added_bar * mix) / pressure
        } else {
            self.mix
        };
        Self {
            pressure_bar: pressure,
            mix: new_mix,
            volume_litres: self.volume_litres,
        }
    }
}

/// A storage cylinder of pure oxygen used to enrich dive cylinders
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OxygenBank {
    pub id: String,
    /// Current bank pressure
    pub bar: f64,
    #[serde(rename = "size")]
    pub size_litres: f64,
    #[serde(rename = "price")]
    pub price_per_litre: f64,
}

impl OxygenBank {
    /// Free litres of O2 the bank still holds
    pub fn available_litres(&self) -> f64 {
        (self.size_litres * self.bar).max(0.0)
    }
}

/// One step of a blend plan
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum BlendAction {
    /// Vent gas from the cylinder before enriching it
    Bleed {
        drained_litres: f64,
        /// Free litres of O2-equivalent enrichment thrown away
        wasted_litres: f64,
        /// `wasted_litres` priced at the cheapest O2
        wasted_cost: f64,
    },
    AddFromBank {
        bank_id: String,
        used_litres: f64,
        left_bar: f64,
        cost: f64,
    },
    /// Top the cylinder off to target pressure with air
    TopOff { added_bar: f64 },
    Pay { cost: f64 },
}

// ============================================================================
// Record Types
// ============================================================================

/// One operator session on a compressor (`<id>_compressor.csv`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompressorRecord {
    pub date: DateTime<Utc>,
    pub operator: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    /// Total compressor runtime in hours at the end of the session
    #[serde(rename = "runtime")]
    pub runtime_hours: f64,
    #[serde(default)]
    pub filters_changed: bool,
}

/// An equipment loan (`loans.csv`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub date: DateTime<Utc>,
    pub item: String,
    pub count: u32,
    pub borrower: String,
    pub lender: String,
    pub donation: f64,
    /// Operator who received the return; unset while the loan is active
    pub returned: Option<String>,
}

impl LoanRecord {
    pub fn is_active(&self) -> bool {
        self.returned.as_deref().map_or(true, |r| r.trim().is_empty())
    }
}

/// One bank draw from a committed blend (`nitrox.csv`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NitroxRecord {
    pub date: DateTime<Utc>,
    pub blender: String,
    pub bank: String,
    pub litres: f64,
    pub bar_left: f64,
    pub cost: f64,
}

/// A named role and its comma separated members (`roles.csv`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub role: String,
    pub list: String,
}

impl RoleRecord {
    pub fn names(&self) -> Vec<String> {
        self.list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

// ============================================================================
// Inventory Types
// ============================================================================

/// One sheet of the equipment inventory (`inventory.json`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventorySheet {
    #[serde(rename = "Class")]
    pub class: String,
    pub heads: Vec<String>,
    pub entries: Vec<Vec<String>>,
}
