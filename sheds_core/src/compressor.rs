//! Compressor runtime log and filter life estimation.
//!
//! Each compressor keeps its own history in `<id>_compressor.csv`. Filter
//! life is estimated by folding that history through an empirical
//! four-parameter curve of consumption rate against intake temperature.

use crate::entries::Entries;
use crate::store::RecordStore;
use crate::{CompressorRecord, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Temperature assumed for records logged without one, °C
pub const NOMINAL_TEMPERATURE: f64 = 20.0;

/// Acceptable water content of compressed air for nitrox, g/m³
const NITROX_WATER_LIMIT: f64 = 0.02;

/// Filter consumption curve and nominal lifetime for one compressor
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Average filter lifetime, hours
    pub lifetime: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl FilterParams {
    /// Relative filter lifetime at `temperature`:
    /// `d + (a - d) / (1 + (T / c)^b)`
    ///
    /// Temperatures below 0 °C are evaluated at 0 °C; the curve is
    /// undefined for negative bases.
    pub fn factor(&self, temperature: f64) -> f64 {
        if temperature < 0.0 {
            tracing::debug!("{}°C is below the filter curve, using 0°C", temperature);
        }
        let t = temperature.max(0.0);
        self.d + (self.a - self.d) / (1.0 + (t / self.c).powf(self.b))
    }
}

/// Remaining filter life in hours as of the last record.
///
/// Walks the history in order. A filters-changed record resets the
/// remaining life to `params.lifetime`; any other record consumes life in
/// proportion to the runtime since the previous record, scaled by the
/// temperature factor. The result is not clamped: a negative value means
/// the change is overdue.
pub fn remaining_filter_life(history: &[CompressorRecord], params: &FilterParams) -> f64 {
    let mut flr = params.lifetime;
    let mut prior_runtime = 0.0;

    for record in history {
        if record.filters_changed {
            flr = params.lifetime;
            tracing::debug!("Filters changed on {}, lifetime reset to {}", record.date, flr);
        } else {
            let dt = record.runtime_hours - prior_runtime;
            if dt > 0.0 {
                let temperature = record.temperature.unwrap_or(NOMINAL_TEMPERATURE);
                let hours_at_t = params.lifetime * params.factor(temperature);
                let used = params.lifetime * dt / hours_at_t;
                flr -= used;
                tracing::debug!(
                    "Run of {:.3}h at {}°C used {:.3}h of filter life, {:.3}h left",
                    dt,
                    temperature,
                    used,
                    flr
                );
            }
        }
        prior_runtime = record.runtime_hours;
    }

    flr
}

/// Parameters of the condensate check
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CondensateParams {
    /// Air pumped, litres per minute
    pub pumping_rate: f64,
    /// Minutes between condensate purges
    pub purge_freq: f64,
    /// Largest acceptable condensate per purge, ml
    pub safe_limit: f64,
}

/// Whether the compressor may run at this intake temperature (°C) and
/// relative humidity (%).
///
/// Water above the nitrox limit condenses out in the separator; the
/// volume expected over one purge period must stay within the safe limit.
pub fn operable(temperature: f64, humidity: f64, params: &CondensateParams) -> bool {
    // Saturation vapour pressure, Pa
    let saturation = 610.78 * (17.2694 * temperature / (temperature + 238.3)).exp();
    // Water at saturation, g/m³
    let saturated = 2.166 * saturation / (temperature + 273.16);
    let actual = saturated * humidity / 100.0;

    if actual <= NITROX_WATER_LIMIT {
        return true;
    }
    let excess = actual - NITROX_WATER_LIMIT;
    let air_per_purge = params.pumping_rate * params.purge_freq / 1000.0; // m³
    let condensate_ml = excess * air_per_purge;

    tracing::debug!(
        "Condensate at {}°C/{}%: {:.2}ml per purge (limit {}ml)",
        temperature,
        humidity,
        condensate_ml,
        params.safe_limit
    );
    condensate_ml <= params.safe_limit
}

/// Format a duration in hours as `HH:MM:SS.ss`
pub fn format_hms(hours: f64) -> String {
    let hours = hours.max(0.0);
    let whole_hours = hours.floor();
    let minutes = (hours - whole_hours) * 60.0;
    let whole_minutes = minutes.floor();
    let seconds = (minutes - whole_minutes) * 60.0;
    format!("{:02}:{:02}:{:05.2}", whole_hours as u64, whole_minutes as u64, seconds)
}

/// Runtime log of one compressor
#[derive(Clone, Debug)]
pub struct Compressor {
    id: String,
    entries: Entries<CompressorRecord>,
}

impl Compressor {
    pub fn file_name(id: &str) -> String {
        format!("{}_compressor.csv", id)
    }

    pub fn load(store: &dyn RecordStore, id: &str) -> Result<Self> {
        let entries = Entries::load(store, Self::file_name(id))?;
        tracing::debug!("{} compressor has {} records", id, entries.len());
        Ok(Self {
            id: id.to_string(),
            entries,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn history(&self) -> &[CompressorRecord] {
        self.entries.as_slice()
    }

    pub fn last_record(&self) -> Option<&CompressorRecord> {
        self.entries.last()
    }

    /// Total runtime as of the last record, hours
    pub fn runtime(&self) -> f64 {
        self.last_record().map_or(0.0, |r| r.runtime_hours)
    }

    /// Date of the most recent filter change
    pub fn last_filter_change(&self) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .rev()
            .find(|r| r.filters_changed)
            .map(|r| r.date)
    }

    pub fn remaining_filter_life(&self, params: &FilterParams) -> f64 {
        remaining_filter_life(self.history(), params)
    }

    /// Append a record and persist. The log is re-read first so records
    /// written by someone else since loading are kept.
    pub fn add_record(&mut self, store: &dyn RecordStore, record: CompressorRecord) -> Result<()> {
        self.entries.reload(store)?;

        let previous = self.runtime();
        if !record.filters_changed && record.runtime_hours < previous {
            tracing::warn!(
                "{} runtime {}h is below the previous {}h",
                self.id,
                record.runtime_hours,
                previous
            );
        }

        tracing::info!(
            "Adding {} compressor record by {}: runtime {}h",
            self.id,
            record.operator,
            record.runtime_hours
        );
        self.entries.push(record);
        self.entries.save(store)
    }

    /// Log a filter change at the current runtime
    pub fn change_filters(
        &mut self,
        store: &dyn RecordStore,
        operator: &str,
        date: DateTime<Utc>,
    ) -> Result<()> {
        self.entries.reload(store)?;
        let record = CompressorRecord {
            date,
            operator: operator.to_string(),
            temperature: None,
            humidity: None,
            runtime_hours: self.runtime(),
            filters_changed: true,
        };
        self.add_record(store, record)
    }
}
