//! Equipment inventory (`inventory.json`).
//!
//! The inventory is a list of sheets, one per class of equipment, each
//! imported from a CSV export. Loans refer to an inventory item by its
//! descriptor, built from the sheet class and the first three columns.

use crate::loans::LoanLedger;
use crate::store::RecordStore;
use crate::{Error, InventorySheet, Result};
use serde::Serialize;

pub const INVENTORY_FILE: &str = "inventory.json";

/// Column holding the number of items of a kind
pub const COUNT_COLUMN: &str = "Count";

impl InventorySheet {
    /// Loan descriptor of one row: `"<Class> <col0>: <col1> <col2>"`
    pub fn descriptor(&self, entry: &[String]) -> String {
        let col = |i: usize| entry.get(i).map(String::as_str).unwrap_or("");
        format!("{} {}: {} {}", self.class, col(0), col(1), col(2))
    }

    pub fn column(&self, head: &str) -> Option<usize> {
        self.heads.iter().position(|h| h == head)
    }
}

/// Whether an inventory item can be picked for a new loan
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ItemAvailability {
    pub descriptor: String,
    /// From the `Count` column; `None` if the sheet has none
    pub count: Option<u32>,
    pub on_loan: u64,
    pub can_pick: bool,
}

impl ItemAvailability {
    /// Whether `n` more can go out without lending more than the inventory holds.
    /// An item without a count is a single piece.
    pub fn can_lend(&self, n: u32) -> bool {
        let wanted = self.on_loan.saturating_add(u64::from(n));
        wanted <= self.count.map_or(1, u64::from)
    }
}

fn availability_of(sheet: &InventorySheet, entry: &[String], loans: &LoanLedger) -> ItemAvailability {
    let descriptor = sheet.descriptor(entry);
    let on_loan = loans.number_on_loan(&descriptor);
    let count = sheet
        .column(COUNT_COLUMN)
        .and_then(|i| entry.get(i))
        .and_then(|c| c.trim().parse::<u32>().ok());
    // Without a count, one loan takes the only item
    let can_pick = on_loan == 0 || count.is_some_and(|c| on_loan < u64::from(c));
    ItemAvailability {
        descriptor,
        count,
        on_loan,
        can_pick,
    }
}

#[derive(Clone, Debug, Default)]
pub struct Inventory {
    sheets: Vec<InventorySheet>,
}

impl Inventory {
    /// Load from the store. No inventory yet is an empty one.
    pub fn load(store: &dyn RecordStore) -> Result<Self> {
        if !store.exists(INVENTORY_FILE) {
            tracing::debug!("No {} in store", INVENTORY_FILE);
            return Ok(Self::default());
        }
        let sheets: Vec<InventorySheet> = serde_json::from_str(&store.read(INVENTORY_FILE)?)?;
        tracing::debug!("Loaded {} inventory sheets", sheets.len());
        Ok(Self { sheets })
    }

    pub fn save(&self, store: &dyn RecordStore) -> Result<()> {
        store.write(INVENTORY_FILE, &serde_json::to_string_pretty(&self.sheets)?)?;
        tracing::info!("Saved {} inventory sheets", self.sheets.len());
        Ok(())
    }

    pub fn sheets(&self) -> &[InventorySheet] {
        &self.sheets
    }

    pub fn sheet(&self, class: &str) -> Option<&InventorySheet> {
        self.sheets.iter().find(|s| s.class == class)
    }

    /// Replace (or add) the sheet for `class` from CSV text whose first
    /// row holds the column heads. Returns the number of rows imported.
    pub fn import_csv(&mut self, class: &str, text: &str) -> Result<usize> {
        let class = class.trim();
        if class.is_empty() {
            return Err(Error::Other("Inventory class must not be empty".into()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let heads: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut entries = Vec::new();
        for row in reader.records() {
            let row = row?;
            if row.iter().all(str::is_empty) {
                continue;
            }
            entries.push(row.iter().map(str::to_string).collect::<Vec<_>>());
        }

        let count = entries.len();
        let sheet = InventorySheet {
            class: class.to_string(),
            heads,
            entries,
        };
        match self.sheets.iter_mut().find(|s| s.class == class) {
            Some(existing) => *existing = sheet,
            None => self.sheets.push(sheet),
        }
        tracing::info!("Imported {} {} items", count, class);
        Ok(count)
    }

    /// Availability of every item on a sheet
    pub fn availability(&self, class: &str, loans: &LoanLedger) -> Option<Vec<ItemAvailability>> {
        self.sheet(class).map(|sheet| {
            sheet
                .entries
                .iter()
                .map(|entry| availability_of(sheet, entry, loans))
                .collect()
        })
    }

    /// Availability of the item with this descriptor, if it is in the inventory
    pub fn find(&self, descriptor: &str, loans: &LoanLedger) -> Option<ItemAvailability> {
        self.sheets.iter().find_map(|sheet| {
            sheet
                .entries
                .iter()
                .find(|entry| sheet.descriptor(entry) == descriptor)
                .map(|entry| availability_of(sheet, entry, loans))
        })
    }
}
