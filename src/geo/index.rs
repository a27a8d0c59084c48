//! # Offline Geo Index Store
//!
//! ## Purpose
//! Persisted per-state complaint counts keyed by vehicle, built once by the
//! flat-file indexer and read-only for every other component.
//!
//! ## Input/Output Specification
//! - **Input**: Aggregated `(year, make, model, state) -> count` groups
//!   (install) or vehicle lookups (read side)
//! - **Output**: State-ranked counts per vehicle, ODI model-variant totals
//! - **Storage**: Sled database, one entry per (year, make, model) with a
//!   bincode-encoded state-count list
//!
//! ## Key Features
//! - Atomic install: built in a temporary location, then swapped into
//!   place so readers never observe a half-written index
//! - Model matching tolerant to ODI naming variants (`ACCORD 4DR`,
//!   `F150`) via alphanumeric prefix comparison

use crate::errors::{IntakeError, Result};
use crate::{StateCount, VehicleKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

const TREE_NAME: &str = "state_counts";
const KEY_SEPARATOR: char = '\u{1f}';

/// Aggregation key for one vehicle group in the dump: ODI-style uppercase
/// year/make/model text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VehicleGroup {
    pub year: String,
    pub make: String,
    pub model: String,
}

/// Total complaint volume for one ODI model spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVariant {
    pub model: String,
    pub total: u64,
}

/// Read handle over the installed offline geo index
#[derive(Debug)]
pub struct GeoIndexStore {
    db: sled::Db,
    tree: sled::Tree,
    location: String,
}

impl GeoIndexStore {
    /// Open an installed index for reading. A missing or unreadable index
    /// is reported as corruption; callers degrade rather than fail.
    pub fn open(path: &Path) -> Result<Self> {
        let location = path.to_string_lossy().to_string();

        if !path.exists() {
            return Err(IntakeError::IndexCorrupted {
                location,
                details: "index has not been built".to_string(),
            });
        }

        let db = sled::open(path).map_err(|e| IntakeError::IndexCorrupted {
            location: location.clone(),
            details: e.to_string(),
        })?;

        let tree = db
            .open_tree(TREE_NAME)
            .map_err(|e| IntakeError::IndexCorrupted {
                location: location.clone(),
                details: e.to_string(),
            })?;

        debug!("Geo index opened at {} ({} vehicle groups)", location, tree.len());
        Ok(Self { db, tree, location })
    }

    /// On-disk size of the installed index.
    pub fn size_on_disk(&self) -> Result<u64> {
        Ok(self.db.size_on_disk()?)
    }

    /// State counts for a vehicle. Rows for the same year/make whose
    /// normalized model name starts with the query's normalized model are
    /// merged, covering ODI naming variants.
    pub fn lookup(&self, key: &VehicleKey) -> Result<Vec<StateCount>> {
        let query_model = normalize_model(&key.model);
        if query_model.is_empty() {
            return Ok(Vec::new());
        }

        let mut merged: HashMap<String, u64> = HashMap::new();
        for (model, counts) in self.rows_for(key.model_year, &key.make)? {
            if !normalize_model(&model).starts_with(&query_model) {
                continue;
            }
            for sc in counts {
                *merged.entry(sc.state).or_insert(0) += sc.count;
            }
        }

        let mut out: Vec<StateCount> = merged
            .into_iter()
            .map(|(state, count)| StateCount { state, count })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.state.cmp(&b.state)));
        Ok(out)
    }

    /// Top ODI model spellings for a year/make, by total complaint volume.
    /// A diagnostic for when vPIC naming drifts from the dump's naming.
    pub fn model_variants(&self, model_year: i32, make: &str, limit: usize) -> Result<Vec<ModelVariant>> {
        let mut totals: HashMap<String, u64> = HashMap::new();
        for (model, counts) in self.rows_for(model_year, make)? {
            let total: u64 = counts.iter().map(|sc| sc.count).sum();
            *totals.entry(model).or_insert(0) += total;
        }

        let mut variants: Vec<ModelVariant> = totals
            .into_iter()
            .map(|(model, total)| ModelVariant { model, total })
            .collect();
        variants.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.model.cmp(&b.model)));
        variants.truncate(limit);
        Ok(variants)
    }

    /// All (model, counts) rows under one year/make prefix.
    fn rows_for(&self, model_year: i32, make: &str) -> Result<Vec<(String, Vec<StateCount>)>> {
        let prefix = format!(
            "{}{}{}{}",
            model_year,
            KEY_SEPARATOR,
            make.trim().to_uppercase(),
            KEY_SEPARATOR
        );

        let mut rows = Vec::new();
        for entry in self.tree.scan_prefix(prefix.as_bytes()) {
            let (key, value) = entry.map_err(|e| IntakeError::IndexCorrupted {
                location: self.location.clone(),
                details: e.to_string(),
            })?;

            let key_text =
                String::from_utf8(key.to_vec()).map_err(|e| IntakeError::IndexCorrupted {
                    location: self.location.clone(),
                    details: format!("non-UTF-8 index key: {}", e),
                })?;
            let model = key_text
                .rsplit(KEY_SEPARATOR)
                .next()
                .unwrap_or_default()
                .to_string();

            let counts: Vec<StateCount> =
                bincode::deserialize(&value).map_err(|e| IntakeError::IndexCorrupted {
                    location: self.location.clone(),
                    details: e.to_string(),
                })?;

            rows.push((model, counts));
        }

        Ok(rows)
    }

    /// Build a fresh index from aggregated groups and swap it into place.
    /// The build happens in a temporary sibling directory; the destination
    /// only ever holds a complete index.
    pub fn install(dest: &Path, groups: &BTreeMap<VehicleGroup, HashMap<String, u64>>) -> Result<()> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let staging = tempfile::Builder::new()
            .prefix(".geo-index-build-")
            .tempdir_in(parent)?;

        {
            let db = sled::open(staging.path()).map_err(|e| IntakeError::DatabaseConnection {
                db_path: staging.path().to_string_lossy().to_string(),
                reason: e.to_string(),
            })?;
            let tree = db.open_tree(TREE_NAME)?;

            for (group, states) in groups {
                let key = format!(
                    "{}{}{}{}{}",
                    group.year, KEY_SEPARATOR, group.make, KEY_SEPARATOR, group.model
                );

                let mut counts: Vec<StateCount> = states
                    .iter()
                    .map(|(state, count)| StateCount {
                        state: state.clone(),
                        count: *count,
                    })
                    .collect();
                counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.state.cmp(&b.state)));

                tree.insert(key.as_bytes(), bincode::serialize(&counts)?)?;
            }

            tree.flush()?;
            db.flush()?;
        }

        // Swap: retire any previous index, then move the staged build in.
        let staged = staging.into_path();
        let retired = dest.with_extension("old");
        if retired.exists() {
            std::fs::remove_dir_all(&retired)?;
        }
        if dest.exists() {
            std::fs::rename(dest, &retired)?;
        }
        std::fs::rename(&staged, dest)?;
        if retired.exists() {
            std::fs::remove_dir_all(&retired)?;
        }

        info!("Installed geo index at {:?} ({} vehicle groups)", dest, groups.len());
        Ok(())
    }
}

/// Collapse a model name to its uppercase alphanumeric core, so `F-150`,
/// `F150`, and `F 150` compare equal.
pub fn normalize_model(model: &str) -> String {
    model
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
