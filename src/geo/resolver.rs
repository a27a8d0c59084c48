//! # Geography Resolver Module
//!
//! ## Purpose
//! Answers "where are the complaints coming from" for one vehicle query,
//! preferring live state-tagged complaint data and falling back to the
//! offline geo index, with the data's origin disclosed on every result.
//!
//! ## Input/Output Specification
//! - **Input**: Vehicle key plus the query's live complaint records
//! - **Output**: State-ranked counts tagged `Live`, `OfflineFallback`, or
//!   `Unavailable`; the tag is mandatory and matches the path taken
//! - **Degradation**: a missing or corrupt offline index yields
//!   `Unavailable`, never a session failure, and never another vehicle's
//!   counts

use crate::client::VehicleDataSource;
use crate::geo::index::{GeoIndexStore, ModelVariant};
use crate::geo::states;
use crate::{ComplaintRecord, StateCount, VehicleKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a geographic result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoProvenance {
    /// Aggregated from state-tagged live complaint records
    Live,
    /// Served from the offline ODI geo index
    OfflineFallback,
    /// No geographic data from any source
    Unavailable,
}

/// State-ranked complaint counts with mandatory provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoSummary {
    pub counts: Vec<StateCount>,
    pub provenance: GeoProvenance,
}

impl GeoSummary {
    fn unavailable() -> Self {
        Self {
            counts: Vec::new(),
            provenance: GeoProvenance::Unavailable,
        }
    }

    pub fn has_data(&self) -> bool {
        !self.counts.is_empty()
    }

    /// Whether complaints cluster regionally: the peak state holds more
    /// than 30% of the total. `None` when there is no data to judge.
    pub fn regional_clustering(&self) -> Option<bool> {
        let total: u64 = self.counts.iter().map(|sc| sc.count).sum();
        if total == 0 {
            return None;
        }
        let peak = self.counts.iter().map(|sc| sc.count).max().unwrap_or(0);
        Some(peak * 10 > total * 3)
    }
}

/// Aggregate live complaint records into state counts, dropping records
/// whose location value does not normalize to a valid state.
pub fn live_state_counts(records: &[ComplaintRecord]) -> Vec<StateCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();

    for record in records {
        let Some(raw) = record.state.as_deref() else {
            continue;
        };
        if let Some(code) = states::normalize(raw) {
            *counts.entry(code).or_insert(0) += 1;
        }
    }

    let mut out: Vec<StateCount> = counts
        .into_iter()
        .map(|(state, count)| StateCount { state, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.state.cmp(&b.state)));
    out
}

/// Per-query resolver over live data and the offline index
pub struct GeoResolver {
    index: Option<Arc<GeoIndexStore>>,
}

impl GeoResolver {
    /// Build a resolver around an already-opened index handle (or none).
    pub fn new(index: Option<Arc<GeoIndexStore>>) -> Self {
        Self { index }
    }

    /// Open the index at `path`, degrading to no-index when it is missing
    /// or unreadable.
    pub fn open(path: &Path) -> Self {
        match GeoIndexStore::open(path) {
            Ok(store) => Self::new(Some(Arc::new(store))),
            Err(e) => {
                warn!("Offline geo index unavailable: {}", e);
                Self::new(None)
            }
        }
    }

    /// Resolve geography for a vehicle from its live complaint records,
    /// falling back to the offline index only when no live record carries
    /// a usable state code.
    pub fn resolve(&self, key: &VehicleKey, live_records: &[ComplaintRecord]) -> GeoSummary {
        let live = live_state_counts(live_records);
        if !live.is_empty() {
            debug!("Geo resolution for {} took the live path ({} states)", key, live.len());
            return GeoSummary {
                counts: live,
                provenance: GeoProvenance::Live,
            };
        }

        let Some(index) = &self.index else {
            return GeoSummary::unavailable();
        };

        match index.lookup(key) {
            Ok(counts) if !counts.is_empty() => {
                debug!(
                    "Geo resolution for {} fell back to the offline index ({} states)",
                    key,
                    counts.len()
                );
                GeoSummary {
                    counts,
                    provenance: GeoProvenance::OfflineFallback,
                }
            }
            Ok(_) => GeoSummary::unavailable(),
            Err(e) => {
                warn!("Offline geo lookup failed for {}: {}", key, e);
                GeoSummary::unavailable()
            }
        }
    }

    /// Fetch this vehicle's complaints from the data source and resolve.
    /// A failed fetch is treated as zero live records, not an error.
    pub async fn resolve_for(
        &self,
        source: &dyn VehicleDataSource,
        key: &VehicleKey,
    ) -> GeoSummary {
        let records = match source.complaints_by_vehicle(key).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Complaint fetch failed during geo resolution for {}: {}", key, e);
                Vec::new()
            }
        };
        self.resolve(key, &records)
    }

    /// Top ODI model spellings for a year/make, when the index is present.
    pub fn model_variants(&self, model_year: i32, make: &str, limit: usize) -> Vec<ModelVariant> {
        let Some(index) = &self.index else {
            return Vec::new();
        };
        match index.model_variants(model_year, make, limit) {
            Ok(variants) => variants,
            Err(e) => {
                warn!("Model variant lookup failed for {} {}: {}", model_year, make, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::index::VehicleGroup;
    use std::collections::BTreeMap;

    fn tagged_record(odi: &str, state: Option<&str>) -> ComplaintRecord {
        ComplaintRecord {
            odi_number: odi.to_string(),
            model_year: Some(2018),
            make: "honda".to_string(),
            model: "accord".to_string(),
            state: state.map(str::to_string),
            summary: String::new(),
            crash: false,
            fire: false,
            injuries: 0,
            deaths: 0,
            components: String::new(),
            date_filed: None,
        }
    }

    fn installed_index(dir: &tempfile::TempDir) -> Arc<GeoIndexStore> {
        let dest = dir.path().join("geo.db");
        let mut groups = BTreeMap::new();
        let mut counts = HashMap::new();
        counts.insert("OH".to_string(), 4u64);
        counts.insert("PA".to_string(), 2u64);
        groups.insert(
            VehicleGroup {
                year: "2018".to_string(),
                make: "HONDA".to_string(),
                model: "ACCORD".to_string(),
            },
            counts,
        );
        GeoIndexStore::install(&dest, &groups).unwrap();
        Arc::new(GeoIndexStore::open(&dest).unwrap())
    }

    #[test]
    fn live_records_with_states_take_the_live_path() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = GeoResolver::new(Some(installed_index(&dir)));

        let records = vec![
            tagged_record("1", Some("CA")),
            tagged_record("2", Some("California")),
            tagged_record("3", Some("Dallas, TX")),
            tagged_record("4", None),
            tagged_record("5", Some("nowhere")),
        ];

        let summary = resolver.resolve(&VehicleKey::new(2018, "Honda", "Accord"), &records);
        assert_eq!(summary.provenance, GeoProvenance::Live);
        assert_eq!(
            summary.counts[0],
            StateCount { state: "CA".to_string(), count: 2 }
        );
        assert_eq!(
            summary.counts[1],
            StateCount { state: "TX".to_string(), count: 1 }
        );
    }

    #[test]
    fn zero_usable_live_states_fall_back_to_the_offline_index() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = GeoResolver::new(Some(installed_index(&dir)));

        // State fields present but unusable still count as zero live data.
        let records = vec![tagged_record("1", None), tagged_record("2", Some("??"))];

        let summary = resolver.resolve(&VehicleKey::new(2018, "Honda", "Accord"), &records);
        assert_eq!(summary.provenance, GeoProvenance::OfflineFallback);
        assert_eq!(summary.counts[0].state, "OH");
        assert_eq!(summary.counts[0].count, 4);
    }

    #[test]
    fn no_source_at_all_is_explicitly_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = GeoResolver::new(Some(installed_index(&dir)));

        // The index only knows the 2018 Accord; this is a different vehicle.
        let summary = resolver.resolve(&VehicleKey::new(2012, "Mazda", "3"), &[]);
        assert_eq!(summary.provenance, GeoProvenance::Unavailable);
        assert!(!summary.has_data());
    }

    #[test]
    fn missing_index_degrades_to_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = GeoResolver::open(&dir.path().join("never-built.db"));

        let summary = resolver.resolve(&VehicleKey::new(2018, "Honda", "Accord"), &[]);
        assert_eq!(summary.provenance, GeoProvenance::Unavailable);
    }

    #[test]
    fn clustering_judgement() {
        let concentrated = GeoSummary {
            counts: vec![
                StateCount { state: "CA".to_string(), count: 8 },
                StateCount { state: "TX".to_string(), count: 2 },
            ],
            provenance: GeoProvenance::Live,
        };
        assert_eq!(concentrated.regional_clustering(), Some(true));

        let broad = GeoSummary {
            counts: vec![
                StateCount { state: "CA".to_string(), count: 3 },
                StateCount { state: "TX".to_string(), count: 3 },
                StateCount { state: "NY".to_string(), count: 3 },
                StateCount { state: "FL".to_string(), count: 3 },
            ],
            provenance: GeoProvenance::Live,
        };
        assert_eq!(broad.regional_clustering(), Some(false));

        assert_eq!(GeoSummary::unavailable().regional_clustering(), None);
    }
}
