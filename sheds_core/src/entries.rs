//! Typed tabular records backed by a CSV blob in the record store.
//!
//! The first CSV row holds the column names; each following row is one
//! record. Rows that fail to parse are logged and skipped so one bad edit
//! doesn't hide the rest of the history.

use crate::store::RecordStore;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Ordered list of records of type `T` kept in one named CSV blob
#[derive(Clone, Debug)]
pub struct Entries<T> {
    name: String,
    records: Vec<T>,
}

impl<T> Entries<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Empty list bound to blob `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
        }
    }

    /// Load the list from the store. A missing blob is an empty list.
    pub fn load(store: &dyn RecordStore, name: impl Into<String>) -> Result<Self> {
        let mut entries = Self::new(name);
        entries.reload(store)?;
        Ok(entries)
    }

    /// Discard in-memory changes and re-read from the store
    pub fn reload(&mut self, store: &dyn RecordStore) -> Result<()> {
        self.records = if store.exists(&self.name) {
            parse_csv(&store.read(&self.name)?)?
        } else {
            tracing::debug!("No {} in store, starting empty", self.name);
            Vec::new()
        };
        tracing::debug!("Loaded {} records from {}", self.records.len(), self.name);
        Ok(())
    }

    /// Write the whole list back to the store
    pub fn save(&self, store: &dyn RecordStore) -> Result<()> {
        store.write(&self.name, &self.to_csv()?)?;
        tracing::info!("Saved {} records to {}", self.records.len(), self.name);
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_writer(Vec::new());
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        let bytes = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| crate::Error::Other(e.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push(&mut self, record: T) {
        self.records.push(record);
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.records.get_mut(index)
    }

    /// Remove and return the record at `index`
    pub fn remove(&mut self, index: usize) -> Option<T> {
        (index < self.records.len()).then(|| self.records.remove(index))
    }

    pub fn last(&self) -> Option<&T> {
        self.records.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse CSV text with a header row into records, skipping bad rows
pub fn parse_csv<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for (row, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(e) => {
                // +2: header row and 1-based numbering
                tracing::warn!("Skipping unparseable CSV row {}: {}", row + 2, e);
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;
    use crate::NitroxRecord;
    use chrono::{TimeZone, Utc};

    fn record(bank: &str, bar_left: f64) -> NitroxRecord {
        NitroxRecord {
            date: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            blender: "Ann".into(),
            bank: bank.into(),
            litres: 438.4,
            bar_left,
            cost: 8.768,
        }
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        let mut entries = Entries::new("nitrox.csv");
        entries.push(record("1", 90.0));
        entries.push(record("2", 180.0));
        entries.save(&store).unwrap();

        let loaded: Entries<NitroxRecord> = Entries::load(&store, "nitrox.csv").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(1), Some(&record("2", 180.0)));
    }

    #[test]
    fn test_missing_blob_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        let entries: Entries<NitroxRecord> = Entries::load(&store, "nitrox.csv").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_reload_discards_unsaved_changes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        let mut entries = Entries::new("nitrox.csv");
        entries.push(record("1", 90.0));
        entries.save(&store).unwrap();

        entries.push(record("2", 10.0));
        assert_eq!(entries.remove(0).map(|r| r.bank), Some("1".to_string()));
        entries.reload(&store).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries.last().unwrap().bank, "1");
        assert!(entries.remove(5).is_none());
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let text = "date,blender,bank,litres,bar_left,cost\n\
                    2024-05-01T10:00:00Z,Ann,1,100,90,2\n\
                    yesterday,Bob,2,lots,80,1\n\
                    2024-05-02T10:00:00Z,Cat,2,50,170,1.25\n";
        let records: Vec<NitroxRecord> = parse_csv(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].blender, "Cat");
    }
}
