//! Persistence module for export/import of simulation state
//!
//! The whole store travels as one versioned document: JSON for interchange, bincode for
//! fast snapshots on disk. The random source is not saved; a restored world reseeds
//! from the configured seed and the tick count.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::components::Calendar;
use crate::config::SimulationConfig;
use crate::error::{Result, SimError};
use crate::store::MemoryStore;
use crate::world::SimulationWorld;

/// Schema version for forward compatibility.
pub const EXPORT_VERSION: u32 = 1;

/// Complete world state for persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportData {
    pub version: u32,
    pub calendar: Calendar,
    pub config: SimulationConfig,
    pub store: MemoryStore,
}

impl ExportData {
    fn check_version(&self) -> Result<()> {
        if self.version != EXPORT_VERSION {
            return Err(SimError::Validation(format!(
                "unsupported export version {} (expected {})",
                self.version, EXPORT_VERSION
            )));
        }
        Ok(())
    }
}

/// Result of import operation
#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    pub people: usize,
    pub families: usize,
    pub titles: usize,
    pub places: usize,
    pub current_date: chrono::NaiveDate,
}

impl ImportResult {
    fn for_store(store: &MemoryStore, calendar: &Calendar) -> Self {
        Self {
            people: store.person_count(),
            families: store.family_count(),
            titles: store.titles().count(),
            places: store.places().count(),
            current_date: calendar.current,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveStats {
    pub people: usize,
    pub bytes: u64,
}

impl SimulationWorld {
    fn export_data(&self) -> ExportData {
        ExportData {
            version: EXPORT_VERSION,
            calendar: self.calendar.clone(),
            config: self.config.clone(),
            store: self.store.clone(),
        }
    }

    /// Export entire world state to a JSON string.
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.export_data())?)
    }

    /// Replace the current state with an exported one.
    pub fn import_json(&mut self, json: &str) -> Result<ImportResult> {
        let data: ExportData = serde_json::from_str(json)?;
        self.replace_with(data)
    }

    pub fn from_json(json: &str) -> Result<(Self, ImportResult)> {
        let data: ExportData = serde_json::from_str(json)?;
        Self::from_export(data)
    }

    /// Write a binary snapshot of the world to `path`.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<SaveStats> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, &self.export_data())?;
        drop(writer);
        let bytes = std::fs::metadata(path)?.len();
        info!(
            "saved {} people to {} ({} bytes)",
            self.store.person_count(),
            path.display(),
            bytes
        );
        Ok(SaveStats {
            people: self.store.person_count(),
            bytes,
        })
    }

    /// Build a world from a snapshot written by [`SimulationWorld::save_snapshot`].
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<(Self, ImportResult)> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let data: ExportData = bincode::deserialize_from(reader)?;
        let loaded = Self::from_export(data)?;
        info!("loaded {} people from {}", loaded.1.people, path.display());
        Ok(loaded)
    }

    fn from_export(data: ExportData) -> Result<(Self, ImportResult)> {
        data.check_version()?;
        let result = ImportResult::for_store(&data.store, &data.calendar);
        let world = SimulationWorld::restore(data.config, data.store, data.calendar)?;
        Ok((world, result))
    }

    fn replace_with(&mut self, data: ExportData) -> Result<ImportResult> {
        let (world, result) = Self::from_export(data)?;
        self.store = world.store;
        self.calendar = world.calendar;
        self.config = world.config;
        self.rng = world.rng;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use chrono::NaiveDate;

    fn world() -> SimulationWorld {
        let config = SimulationConfig {
            seed: 42,
            start_date: NaiveDate::from_ymd_opt(1720, 1, 1).unwrap(),
            founder_count: 3,
            ..Default::default()
        };
        let mut world = SimulationWorld::new(config).unwrap();
        world.seed_founders().unwrap();
        world
    }

    #[test]
    fn test_json_round_trip_keeps_store_and_date() {
        let original = world();
        let json = original.export_json().unwrap();
        let (restored, result) = SimulationWorld::from_json(&json).unwrap();
        assert_eq!(result.people, original.store.person_count());
        assert_eq!(restored.current_date(), original.current_date());
        let first = original.store.people().next().unwrap();
        assert_eq!(restored.store.load(first.id).unwrap().name(), first.name());
        assert_eq!(restored.store.family_count(), original.store.family_count());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let original = world();
        let mut value: serde_json::Value = serde_json::from_str(&original.export_json().unwrap()).unwrap();
        value["version"] = serde_json::json!(99);
        let mut other = world();
        assert!(matches!(
            other.import_json(&value.to_string()),
            Err(SimError::Validation(_))
        ));
    }
}
