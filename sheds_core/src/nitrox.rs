//! Nitrox fill log (`nitrox.csv`) and O2 bank levels.
//!
//! Every committed blend appends one row per bank it drew from, carrying
//! the pressure left in that bank. Bank levels are the configured levels
//! overridden by the latest row for each bank.

use crate::blend::BlendPlan;
use crate::config::Config;
use crate::entries::Entries;
use crate::store::RecordStore;
use crate::{Error, NitroxRecord, OxygenBank, Result};
use chrono::{DateTime, Utc};

pub const NITROX_FILE: &str = "nitrox.csv";

/// Log of O2 drawn from the banks
#[derive(Clone, Debug)]
pub struct NitroxLog {
    entries: Entries<NitroxRecord>,
}

impl NitroxLog {
    pub fn load(store: &dyn RecordStore) -> Result<Self> {
        Ok(Self {
            entries: Entries::load(store, NITROX_FILE)?,
        })
    }

    pub fn records(&self) -> &[NitroxRecord] {
        self.entries.as_slice()
    }

    /// Apply the latest logged pressure of each bank
    pub fn restore_bank_levels(&self, banks: &mut [OxygenBank]) {
        for record in self.entries.iter() {
            match banks.iter_mut().find(|b| b.id == record.bank) {
                Some(bank) => bank.bar = record.bar_left,
                None => tracing::warn!("Nitrox log names unknown bank {}", record.bank),
            }
        }
    }

    /// Configured banks at their current levels
    pub fn current_banks(&self, config: &Config) -> Result<Vec<OxygenBank>> {
        let mut banks = config.banks()?;
        self.restore_bank_levels(&mut banks);
        Ok(banks)
    }

    /// Record the bank draws of a feasible plan. Returns the number of rows added.
    pub fn commit(
        &mut self,
        store: &dyn RecordStore,
        plan: &BlendPlan,
        blender: &str,
        date: DateTime<Utc>,
    ) -> Result<usize> {
        if !plan.feasible {
            return Err(Error::Other("Cannot record an infeasible blend".into()));
        }
        let records = plan.nitrox_records(blender, date);
        if records.is_empty() {
            tracing::info!("Blend used no O2, nothing to record");
            return Ok(0);
        }

        self.entries.reload(store)?;
        let count = records.len();
        for record in records {
            self.entries.push(record);
        }
        self.entries.save(store)?;
        tracing::info!("Recorded {} bank draws by {}", count, blender);
        Ok(count)
    }

    /// Set a bank's pressure by hand after a refill or a gauge check.
    ///
    /// The new level goes to the club config and is logged as a zero-litre
    /// draw so it also wins over earlier log rows.
    pub fn fix_bank(
        &mut self,
        store: &dyn RecordStore,
        config: &mut Config,
        bank_id: &str,
        bar: f64,
        operator: &str,
        date: DateTime<Utc>,
    ) -> Result<()> {
        config.set_bank_bar(bank_id, bar)?;
        config.save(store)?;

        self.entries.reload(store)?;
        self.entries.push(NitroxRecord {
            date,
            blender: operator.to_string(),
            bank: bank_id.to_string(),
            litres: 0.0,
            bar_left: bar,
            cost: 0.0,
        });
        self.entries.save(store)?;
        tracing::info!("Bank {} fixed at {} bar by {}", bank_id, bar, operator);
        Ok(())
    }
}
