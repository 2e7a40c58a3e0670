//! Caller-owned memoization of loader results.
//!
//! Keys are the logical inputs of each load (directory, naming convention and
//! ordered school names), so a hit returns exactly what a fresh load would.
//! Only complete, successful loads are stored.

use super::loader::{DataLoader, LoaderError};
use super::model::{EnvironmentRecord, GrowthRecord, School, SchoolTable};
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type EnvironmentTable = SchoolTable<Vec<EnvironmentRecord>>;
pub type GrowthTable = SchoolTable<Vec<GrowthRecord>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EnvironmentKey {
    dir: PathBuf,
    suffix: String,
    schools: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GrowthKey {
    dir: PathBuf,
    file_name: String,
}

#[derive(Debug, Default)]
pub struct LoadCache {
    environment: HashMap<EnvironmentKey, Arc<EnvironmentTable>>,
    growth: HashMap<GrowthKey, Arc<GrowthTable>>,
}

impl LoadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment table for `schools`, loading it on a miss.
    ///
    /// A load with any per-school failure is returned as that failure and not cached.
    pub fn environment(
        &mut self,
        loader: &DataLoader,
        schools: &[School],
    ) -> Result<Arc<EnvironmentTable>, LoaderError> {
        let key = EnvironmentKey {
            dir: loader.dir().to_path_buf(),
            suffix: loader.environment_suffix().to_string(),
            schools: schools.iter().map(|s| s.name.clone()).collect(),
        };
        if let Some(hit) = self.environment.get(&key) {
            debug!("Environment cache hit for {}", key.dir.display());
            return Ok(Arc::clone(hit));
        }

        let table = Arc::new(loader.load_environment(schools)?.into_complete()?);
        self.environment.insert(key, Arc::clone(&table));
        Ok(table)
    }

    /// Growth table from `file_name`, loading it on a miss.
    pub fn growth(
        &mut self,
        loader: &DataLoader,
        file_name: &str,
    ) -> Result<Arc<GrowthTable>, LoaderError> {
        let key = GrowthKey {
            dir: loader.dir().to_path_buf(),
            file_name: file_name.to_string(),
        };
        if let Some(hit) = self.growth.get(&key) {
            debug!("Growth cache hit for {}", key.dir.display());
            return Ok(Arc::clone(hit));
        }

        let table = Arc::new(loader.load_growth(file_name)?);
        self.growth.insert(key, Arc::clone(&table));
        Ok(table)
    }

    /// Drop every cached entry.
    pub fn invalidate(&mut self) {
        self.environment.clear();
        self.growth.clear();
    }

    /// Drop the entries loaded from `dir`.
    pub fn invalidate_dir(&mut self, dir: &Path) {
        self.environment.retain(|key, _| key.dir != dir);
        self.growth.retain(|key, _| key.dir != dir);
    }

    pub fn len(&self) -> usize {
        self.environment.len() + self.growth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
