//! Nitrox blend planning by partial pressure.
//!
//! Given the gas already in a cylinder and the mix and pressure wanted,
//! the planner works out the steps an operator has to perform:
//!
//! 1. bleed the cylinder down if it is too rich or too full to reach the
//!    target,
//! 2. decant oxygen from the selected banks, in the order given,
//! 3. top off to the target pressure with air,
//!
//! and what the oxygen costs. Quantities follow the ideal gas
//! approximation: pressures add linearly and O2 partial pressures add by
//! Dalton's law. Gas volumes are free litres (litres at 1 bar).

use crate::{BlendAction, Error, GasState, NitroxRecord, OxygenBank, Result, AIR_MIX, OXYGEN_MIX};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pressure tolerance, bar
const EPSILON: f64 = 1e-9;

/// Inputs to one cylinder fill
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendConditions {
    /// Ambient temperature, °C. Carried for a future real gas correction;
    /// the plan itself is ideal gas.
    pub temperature: f64,
    pub start_pressure: f64,
    pub start_mix: f64,
    /// Water capacity of the cylinder, litres
    pub cylinder_size: f64,
    pub target_pressure: f64,
    pub target_mix: f64,
    /// O2 fraction of bank gas
    pub fill_mix: f64,
    /// O2 fraction of the top-off gas
    pub top_off_mix: f64,
    /// Price per litre of the cheapest O2, used to cost bled gas
    pub min_o2_price: f64,
}

impl Default for BlendConditions {
    fn default() -> Self {
        Self {
            temperature: 20.0,
            start_pressure: 0.0,
            start_mix: AIR_MIX,
            cylinder_size: 12.0,
            target_pressure: 232.0,
            target_mix: 0.32,
            fill_mix: OXYGEN_MIX,
            top_off_mix: AIR_MIX,
            min_o2_price: 0.0,
        }
    }
}

impl BlendConditions {
    pub fn start_state(&self) -> GasState {
        GasState::new(self.start_pressure, self.start_mix, self.cylinder_size)
    }

    pub fn target_state(&self) -> GasState {
        GasState::new(self.target_pressure, self.target_mix, self.cylinder_size)
    }

    /// Reject conditions no plan can be computed for
    pub fn validate(&self) -> Result<()> {
        let numbers = [
            ("temperature", self.temperature),
            ("start_pressure", self.start_pressure),
            ("start_mix", self.start_mix),
            ("cylinder_size", self.cylinder_size),
            ("target_pressure", self.target_pressure),
            ("target_mix", self.target_mix),
            ("fill_mix", self.fill_mix),
            ("top_off_mix", self.top_off_mix),
            ("min_o2_price", self.min_o2_price),
        ];
        if let Some((name, _)) = numbers.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::InvalidBlend(format!("{} is not a number", name)));
        }

        for (name, mix) in [
            ("start_mix", self.start_mix),
            ("target_mix", self.target_mix),
            ("fill_mix", self.fill_mix),
            ("top_off_mix", self.top_off_mix),
        ] {
            if !(0.0..=1.0).contains(&mix) {
                return Err(Error::InvalidBlend(format!(
                    "{} must be between 0 and 1, got {}",
                    name, mix
                )));
            }
        }

        if self.cylinder_size <= 0.0 {
            return Err(Error::InvalidBlend("cylinder_size must be positive".into()));
        }
        if self.start_pressure < 0.0 || self.target_pressure < 0.0 {
            return Err(Error::InvalidBlend("pressures must not be negative".into()));
        }
        if self.fill_mix <= self.top_off_mix {
            return Err(Error::InvalidBlend(
                "fill gas must be richer than top-off gas".into(),
            ));
        }
        if self.min_o2_price < 0.0 {
            return Err(Error::InvalidBlend("min_o2_price must not be negative".into()));
        }
        Ok(())
    }

    /// O2 needed from the banks, in litre-bar, to go from `pressure` bar
    /// of `mix` to the target: `Sc × (Pd·Md − P·M)`, never negative
    fn oxygen_needed(&self, pressure: f64, mix: f64) -> f64 {
        (self.cylinder_size * (self.target_pressure * self.target_mix - pressure * mix)).max(0.0)
    }

    /// Highest cylinder pressure the fill can start from, or `None` when
    /// no bleed reaches the target with this fill gas.
    ///
    /// The start is bled down when its O2 partial pressure is above the
    /// target's (to `Pb·Ms = Pd·Md`) and when the fill gas would not fit
    /// under the target pressure (`Pb(Mf − Ms) <= Pd(Mf − Md)`).
    fn bleed_limit(&self) -> Option<f64> {
        let (ms, md, mf) = (self.start_mix, self.target_mix, self.fill_mix);
        let pd = self.target_pressure;
        if md > mf {
            return None;
        }

        let mut limit = self.start_pressure;
        if pd * md < self.start_pressure * ms {
            limit = limit.min(pd * md / ms);
        }
        if ms < mf {
            limit = limit.min(pd * (mf - md) / (mf - ms));
        }
        Some(limit.max(0.0))
    }
}

/// Why a plan can't be carried out
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Infeasibility {
    /// No amount of bleeding reaches the target with these gases
    UnreachableMix,
    /// The selected banks hold less O2 than the blend needs
    BanksExhausted { shortfall_litres: f64 },
}

/// Result of planning one fill
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendPlan {
    /// Steps in the order they must be performed. Empty when infeasible.
    pub actions: Vec<BlendAction>,
    pub feasible: bool,
    pub infeasibility: Option<Infeasibility>,
    /// Total paid for bank gas
    pub total_cost: f64,
    /// Cylinder contents after the last step
    pub final_state: GasState,
}

impl BlendPlan {
    fn infeasible(reason: Infeasibility, start: GasState) -> Self {
        Self {
            actions: Vec::new(),
            feasible: false,
            infeasibility: Some(reason),
            total_cost: 0.0,
            final_state: start,
        }
    }

    /// Convert an infeasible plan into an error
    pub fn into_result(self) -> Result<Self> {
        match self.infeasibility {
            None => Ok(self),
            Some(Infeasibility::BanksExhausted { shortfall_litres }) => {
                Err(Error::InfeasibleBlend { shortfall_litres })
            }
            Some(Infeasibility::UnreachableMix) => Err(Error::InvalidBlend(
                "target mix cannot be reached with these gases".into(),
            )),
        }
    }

    /// One fill log record per bank draw
    pub fn nitrox_records(&self, blender: &str, date: DateTime<Utc>) -> Vec<NitroxRecord> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                BlendAction::AddFromBank {
                    bank_id,
                    used_litres,
                    left_bar,
                    cost,
                } => Some(NitroxRecord {
                    date,
                    blender: blender.to_string(),
                    bank: bank_id.clone(),
                    litres: *used_litres,
                    bar_left: *left_bar,
                    cost: *cost,
                }),
                _ => None,
            })
            .collect()
    }

    /// Numbered, human readable steps
    pub fn render(&self) -> String {
        self.actions
            .iter()
            .enumerate()
            .map(|(n, action)| format!("{}. {}\n", n + 1, action))
            .collect()
    }
}

impl fmt::Display for BlendAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlendAction::Bleed {
                drained_litres,
                wasted_litres,
                wasted_cost,
            } => {
                write!(f, "Bleed {:.0} litres from the cylinder", drained_litres)?;
                if *wasted_litres > 0.0 {
                    write!(
                        f,
                        ", wasting {:.0} litres of O2 worth {:.2}",
                        wasted_litres, wasted_cost
                    )?;
                }
                Ok(())
            }
            BlendAction::AddFromBank {
                bank_id,
                used_litres,
                left_bar,
                cost,
            } => write!(
                f,
                "Add {:.0} litres of O2 from bank {}, leaving {:.0} bar in the bank (cost {:.2})",
                used_litres, bank_id, left_bar, cost
            ),
            BlendAction::TopOff { added_bar } => {
                write!(f, "Top off with {:.0} bar of air", added_bar)
            }
            BlendAction::Pay { cost } => write!(f, "Pay {:.2}", cost),
        }
    }
}

/// Maximum operating depth in whole metres for `mix` at `ppo2_max` bar
pub fn max_operating_depth(ppo2_max: f64, mix: f64) -> Option<f64> {
    (mix > 0.0 && ppo2_max.is_finite()).then(|| ((ppo2_max / mix - 1.0) * 10.0).floor())
}

/// Plans fills for one set of conditions
#[derive(Clone, Copy, Debug)]
pub struct BlendPlanner {
    conditions: BlendConditions,
}

impl BlendPlanner {
    pub fn new(conditions: BlendConditions) -> Self {
        Self { conditions }
    }

    pub fn conditions(&self) -> &BlendConditions {
        &self.conditions
    }

    /// Plan without touching the banks
    pub fn preview(&self, banks: &[OxygenBank]) -> Result<BlendPlan> {
        let mut scratch = banks.to_vec();
        self.blend(&mut scratch)
    }

    /// Plan the fill and draw the oxygen from `banks`, lowering `bar` on
    /// each bank used. Banks are drawn from in slice order and banks at or
    /// below 0 bar are skipped. An infeasible plan leaves every bank as it was.
    pub fn blend(&self, banks: &mut [OxygenBank]) -> Result<BlendPlan> {
        let c = &self.conditions;
        c.validate()?;
        validate_banks(banks)?;

        let start = c.start_state();
        let mut cylinder = start;
        let mut actions = Vec::new();

        tracing::debug!(
            "Blending {:.1} bar of {:.3} to {:.1} bar of {:.3} in {} litres at {}°C",
            c.start_pressure,
            c.start_mix,
            c.target_pressure,
            c.target_mix,
            c.cylinder_size,
            c.temperature
        );

        let Some(bleed_to) = c.bleed_limit() else {
            tracing::debug!("Target mix {} is richer than the fill gas", c.target_mix);
            return Ok(BlendPlan::infeasible(Infeasibility::UnreachableMix, start));
        };

        if c.start_pressure - bleed_to > EPSILON {
            let drained_bar = c.start_pressure - bleed_to;
            let drained_litres = c.cylinder_size * drained_bar;
            // O2 vented over and above what air would have carried
            let wasted_litres = drained_litres * (c.start_mix - c.top_off_mix).max(0.0);
            let wasted_cost = wasted_litres * c.min_o2_price;
            tracing::debug!("Bleeding {:.3} bar down to {:.3} bar", drained_bar, bleed_to);

            actions.push(BlendAction::Bleed {
                drained_litres,
                wasted_litres,
                wasted_cost,
            });
            cylinder = cylinder.bled_to(bleed_to);
        }

        // Bank gas in free litres; with pure O2 this is the O2 litre-bar itself
        let needed = c.oxygen_needed(cylinder.pressure_bar, cylinder.mix) / c.fill_mix;

        let available: f64 = banks
            .iter()
            .filter(|b| b.bar > 0.0)
            .map(OxygenBank::available_litres)
            .sum();
        if needed > available + EPSILON {
            let shortfall_litres = needed - available;
            tracing::debug!(
                "Need {:.1} litres of O2 but the banks hold {:.1}",
                needed,
                available
            );
            return Ok(BlendPlan::infeasible(
                Infeasibility::BanksExhausted { shortfall_litres },
                start,
            ));
        }

        let mut remaining = needed;
        let mut total_cost = 0.0;
        for bank in banks.iter_mut() {
            if remaining <= EPSILON {
                break;
            }
            if bank.bar <= 0.0 {
                continue;
            }

            let bank_litres = bank.available_litres();
            let used_litres = remaining.min(bank_litres);
            bank.bar = if used_litres >= bank_litres {
                0.0
            } else {
                bank.bar - used_litres / bank.size_litres
            };
            let cost = used_litres * bank.price_per_litre;
            tracing::debug!(
                "Drawing {:.1} litres from bank {}, {:.1} bar left",
                used_litres,
                bank.id,
                bank.bar
            );

            cylinder = cylinder.with_added(used_litres / c.cylinder_size, c.fill_mix);
            remaining -= used_litres;
            total_cost += cost;
            actions.push(BlendAction::AddFromBank {
                bank_id: bank.id.clone(),
                used_litres,
                left_bar: bank.bar,
                cost,
            });
        }

        let added_bar = (c.target_pressure - cylinder.pressure_bar).max(0.0);
        let topped = cylinder.with_added(added_bar, c.top_off_mix);
        let final_state = GasState {
            pressure_bar: c.target_pressure,
            ..topped
        };
        actions.push(BlendAction::TopOff { added_bar });

        if total_cost > 0.0 {
            actions.push(BlendAction::Pay { cost: total_cost });
        }

        tracing::debug!(
            "Planned {} actions, final mix {:.4}, cost {:.2}",
            actions.len(),
            final_state.mix,
            total_cost
        );

        Ok(BlendPlan {
            actions,
            feasible: true,
            infeasibility: None,
            total_cost,
            final_state,
        })
    }
}

/// Plan a fill, drawing from `banks` in place
pub fn plan_blend(conditions: &BlendConditions, banks: &mut [OxygenBank]) -> Result<BlendPlan> {
    BlendPlanner::new(*conditions).blend(banks)
}

fn validate_banks(banks: &[OxygenBank]) -> Result<()> {
    for bank in banks {
        if !bank.size_litres.is_finite() || bank.size_litres <= 0.0 {
            return Err(Error::InvalidBlend(format!(
                "bank {} must have a positive size",
                bank.id
            )));
        }
        if !bank.bar.is_finite() || !bank.price_per_litre.is_finite() || bank.price_per_litre < 0.0
        {
            return Err(Error::InvalidBlend(format!(
                "bank {} has an invalid pressure or price",
                bank.id
            )));
        }
    }
    Ok(())
}
