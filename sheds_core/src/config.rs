//! Club configuration, shared through the record store as `config.json`.
//!
//! Keys are addressed with colon-delimited paths such as
//! `compressor:fixed:filter:lifetime`. Values saved in the store are
//! merged over the built-in defaults, so a partial file only overrides
//! what it names.

use crate::compressor::{CondensateParams, FilterParams};
use crate::store::RecordStore;
use crate::{Error, OxygenBank, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Name of the configuration blob in the store
pub const CONFIG_FILE: &str = "config.json";

static DEFAULTS: Lazy<Value> = Lazy::new(|| {
    json!({
        "loan_return": 10,
        "o2": {
            "price": 0.01,
            "bank": {
                "1": { "size": 50.2, "price": 0.015, "bar": 96 },
                "2": { "size": 47.5, "price": 0.02, "bar": 190 },
                "3": { "size": 15, "price": 0.025, "bar": 210 },
                "4": { "size": 11, "price": 0.03, "bar": 230 }
            }
        },
        "compressor": {
            "portable": {
                "filter": {
                    "lifetime": 15,
                    "a": 1.84879,
                    "b": 1.124939,
                    "c": 14.60044,
                    "d": -0.3252651
                }
            },
            "fixed": {
                "filter": {
                    "lifetime": 40,
                    "a": 3.798205,
                    "b": 1.149582,
                    "c": 11.50844,
                    "d": -0.4806983
                },
                "pumping_rate": 300,
                "purge_freq": 5,
                "safe_limit": 25
            }
        }
    })
});

/// Bank entry as stored under `o2:bank:<id>`
#[derive(Debug, Deserialize)]
struct BankSpec {
    size: f64,
    price: f64,
    bar: f64,
}

/// Club configuration tree
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    data: Value,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DEFAULTS.clone(),
        }
    }
}

impl Config {
    /// Load from the store, merged over defaults. A missing blob gives defaults.
    pub fn load(store: &dyn RecordStore) -> Result<Self> {
        let mut config = Self::default();
        if !store.exists(CONFIG_FILE) {
            tracing::info!("No {} in store, using defaults", CONFIG_FILE);
            return Ok(config);
        }
        let saved: Value = serde_json::from_str(&store.read(CONFIG_FILE)?)?;
        if !saved.is_object() {
            return Err(Error::Config(format!("{} is not a JSON object", CONFIG_FILE)));
        }
        merge(&mut config.data, saved);
        tracing::info!("Loaded {}", CONFIG_FILE);
        Ok(config)
    }

    pub fn save(&self, store: &dyn RecordStore) -> Result<()> {
        store.write(CONFIG_FILE, &serde_json::to_string_pretty(&self.data)?)?;
        tracing::info!("Saved {}", CONFIG_FILE);
        Ok(())
    }

    /// Value at a colon path, if every segment exists
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split(':')
            .try_fold(&self.data, |node, key| node.as_object()?.get(key))
    }

    /// Typed value at a colon path
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self
            .get(path)
            .ok_or_else(|| Error::Config(format!("Missing config key {}", path)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| Error::Config(format!("Bad value for {}: {}", path, e)))
    }

    /// Set a value at a colon path, creating intermediate objects.
    /// A non-object found on the way is replaced.
    pub fn set(&mut self, path: &str, value: Value) {
        let mut keys: Vec<&str> = path.split(':').collect();
        let Some(last) = keys.pop() else {
            return;
        };
        let mut node = &mut self.data;
        for key in keys {
            node = ensure_object(node)
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        ensure_object(node).insert(last.to_string(), value);
    }

    /// Days before an active loan is overdue
    pub fn loan_return_days(&self) -> i64 {
        self.get("loan_return").and_then(Value::as_i64).unwrap_or(10)
    }

    /// All configured O2 banks, ordered by id
    pub fn banks(&self) -> Result<Vec<OxygenBank>> {
        let Some(table) = self.get("o2:bank").and_then(Value::as_object) else {
            return Ok(Vec::new());
        };
        table
            .iter()
            .map(|(id, spec)| {
                let spec: BankSpec = serde_json::from_value(spec.clone())
                    .map_err(|e| Error::Config(format!("Bad bank {}: {}", id, e)))?;
                Ok(OxygenBank {
                    id: id.clone(),
                    bar: spec.bar,
                    size_litres: spec.size,
                    price_per_litre: spec.price,
                })
            })
            .collect()
    }

    /// Set a bank's current pressure ("fix bank")
    pub fn set_bank_bar(&mut self, id: &str, bar: f64) -> Result<()> {
        let path = format!("o2:bank:{}", id);
        if self.get(&path).is_none() {
            return Err(Error::Config(format!("No O2 bank {}", id)));
        }
        if !bar.is_finite() || bar < 0.0 {
            return Err(Error::Config(format!("Bank pressure must be >= 0, got {}", bar)));
        }
        self.set(&format!("{}:bar", path), json!(bar));
        Ok(())
    }

    /// Price per litre of the cheapest configured O2
    pub fn cheapest_o2_price(&self) -> Result<Option<f64>> {
        Ok(self
            .banks()?
            .iter()
            .map(|b| b.price_per_litre)
            .reduce(f64::min))
    }

    pub fn filter_params(&self, compressor: &str) -> Result<FilterParams> {
        self.get_as(&format!("compressor:{}:filter", compressor))
    }

    pub fn condensate_params(&self, compressor: &str) -> Result<CondensateParams> {
        self.get_as(&format!("compressor:{}", compressor))
    }

    pub fn as_value(&self) -> &Value {
        &self.data
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just made an object"),
    }
}

/// Deep merge `over` into `base`; objects merge key by key, anything else replaces
fn merge(base: &mut Value, over: Value) {
    match (base, over) {
        (Value::Object(base), Value::Object(over)) => {
            for (key, value) in over {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, over) => *base = over,
    }
}
