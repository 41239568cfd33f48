#![forbid(unsafe_code)]

//! Core domain model and business logic for the dive club shed manager.
//!
//! This crate provides:
//! - Domain types (gas states, O2 banks, blend actions, log records)
//! - Nitrox blend planning against a set of O2 banks
//! - Compressor filter life estimation
//! - Loan validation and the loan ledger
//! - Equipment inventory
//! - Persistence (record store, CSV entries, club config)

pub mod types;
pub mod error;
pub mod store;
pub mod entries;
pub mod settings;
pub mod config;
pub mod logging;
pub mod blend;
pub mod compressor;
pub mod nitrox;
pub mod roles;
pub mod loans;
pub mod inventory;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use store::{FileStore, RecordStore};
pub use entries::Entries;
pub use settings::Settings;
pub use config::Config;
pub use blend::{plan_blend, BlendConditions, BlendPlan, BlendPlanner, Infeasibility};
pub use compressor::{remaining_filter_life, Compressor, CondensateParams, FilterParams};
pub use nitrox::NitroxLog;
pub use roles::{RoleLookup, Roles};
pub use loans::{validate_loan, LoanCandidate, LoanField, LoanLedger, LoanValidation};
pub use inventory::{Inventory, ItemAvailability};
