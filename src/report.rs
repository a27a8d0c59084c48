//! # Intake Report Module
//!
//! ## Purpose
//! Assembles everything one attorney-facing interaction needs (decoded
//! vehicle metadata, recalls, complaints, severity, case strength,
//! geography, and volume trends) as plain structured data. Rendering
//! belongs to the dashboard collaborator, not this crate.
//!
//! ## Input/Output Specification
//! - **Input**: A vehicle descriptor (VIN or year/make/model)
//! - **Output**: A `VehicleReport` with every summary populated
//! - **Degradation**: endpoint failures degrade to empty sections with a
//!   warning; only an undecodable identifier fails the report

use crate::analytics::{
    case_strength, component_frequency, severity_summary, volume_series, CaseStrength,
    ComponentCount, Granularity, PeriodCount, SeveritySummary,
};
use crate::client::{NhtsaClient, VehicleDataSource};
use crate::config::{Config, SearchConfig};
use crate::errors::{IntakeError, Result};
use crate::geo::resolver::{GeoResolver, GeoSummary};
use crate::search::{search, SeverityFilters};
use crate::storage::CacheStore;
use crate::{ComplaintRecord, RecallRecord, VehicleDescriptor, VehicleInfo, VehicleKey};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// How many components the defect-pattern section carries.
const TOP_COMPONENTS: usize = 15;

/// Everything the presentation layer needs for one vehicle, as plain data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleReport {
    /// The resolved query key
    pub key: VehicleKey,
    /// Decoded metadata when the query started from a VIN
    pub vehicle: Option<VehicleInfo>,
    pub recalls: Vec<RecallRecord>,
    pub complaints: Vec<ComplaintRecord>,
    pub recall_count: usize,
    pub complaint_count: usize,
    pub severity: SeveritySummary,
    pub case_strength: CaseStrength,
    pub top_components: Vec<ComponentCount>,
    pub monthly_volume: Vec<PeriodCount>,
    pub yearly_volume: Vec<PeriodCount>,
    pub geography: GeoSummary,
    pub generated_at: DateTime<Utc>,
}

/// VIN format check: 17 characters from the VIN alphabet (no I, O, Q).
pub fn is_valid_vin(vin: &str) -> bool {
    static VIN_PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = VIN_PATTERN
        .get_or_init(|| Regex::new(r"^[A-HJ-NPR-Z0-9]{17}$").expect("static VIN pattern"));
    pattern.is_match(&vin.trim().to_uppercase())
}

/// Composition root for one interactive session
pub struct IntakeService {
    source: Arc<dyn VehicleDataSource>,
    resolver: GeoResolver,
    search_config: SearchConfig,
}

impl IntakeService {
    /// Wire up the full stack from configuration: cache store, HTTP
    /// client, and geo resolver.
    pub async fn new(config: &Config) -> Result<Self> {
        let cache = Arc::new(CacheStore::open(config.cache.clone()).await?);
        let client = NhtsaClient::new(config.client.clone(), cache)?;

        Ok(Self {
            source: Arc::new(client),
            resolver: GeoResolver::open(&config.geo_index.db_path),
            search_config: config.search.clone(),
        })
    }

    /// Wire up around an injected data source and resolver (tests, or a
    /// caller that owns the client).
    pub fn with_source(
        source: Arc<dyn VehicleDataSource>,
        resolver: GeoResolver,
        search_config: SearchConfig,
    ) -> Self {
        Self {
            source,
            resolver,
            search_config,
        }
    }

    /// Build the full intake report for a vehicle.
    pub async fn build_report(&self, descriptor: &VehicleDescriptor) -> Result<VehicleReport> {
        let (key, vehicle) = self.resolve_descriptor(descriptor).await?;
        info!("Building intake report for {}", key);

        let (recalls, complaints) = futures::join!(
            self.source.recalls_by_vehicle(&key),
            self.source.complaints_by_vehicle(&key)
        );

        let recalls = recalls.unwrap_or_else(|e| {
            warn!("Recall lookup degraded to empty for {}: {}", key, e);
            Vec::new()
        });
        let complaints = complaints.unwrap_or_else(|e| {
            warn!("Complaint lookup degraded to empty for {}: {}", key, e);
            Vec::new()
        });

        let severity = severity_summary(&complaints);
        let strength = case_strength(recalls.len(), complaints.len(), &severity);
        let geography = self.resolver.resolve(&key, &complaints);

        Ok(VehicleReport {
            recall_count: recalls.len(),
            complaint_count: complaints.len(),
            top_components: component_frequency(&complaints, TOP_COMPONENTS),
            monthly_volume: volume_series(&complaints, Granularity::Monthly),
            yearly_volume: volume_series(&complaints, Granularity::Yearly),
            case_strength: strength,
            severity,
            geography,
            key,
            vehicle,
            recalls,
            complaints,
            generated_at: Utc::now(),
        })
    }

    /// Filter a report's complaints by keyword and severity, with the
    /// limit clamped to the configured ceiling.
    pub fn search_complaints(
        &self,
        report: &VehicleReport,
        keyword: Option<&str>,
        filters: &SeverityFilters,
        limit: Option<usize>,
    ) -> Vec<ComplaintRecord> {
        let limit = limit
            .unwrap_or(self.search_config.default_limit)
            .clamp(1, self.search_config.max_limit);
        search(&report.complaints, keyword, filters, limit)
    }

    /// Official model names for the sidebar's model picker.
    pub async fn model_picker(&self, make: &str, model_year: i32) -> Result<Vec<String>> {
        self.source.models_for_make_year(make, model_year).await
    }

    /// Top ODI model spellings for a year/make from the offline index.
    pub fn model_variants(
        &self,
        model_year: i32,
        make: &str,
        limit: usize,
    ) -> Vec<crate::geo::index::ModelVariant> {
        self.resolver.model_variants(model_year, make, limit)
    }

    /// Turn a descriptor into a concrete query key, decoding VINs first.
    async fn resolve_descriptor(
        &self,
        descriptor: &VehicleDescriptor,
    ) -> Result<(VehicleKey, Option<VehicleInfo>)> {
        match descriptor {
            VehicleDescriptor::YearMakeModel(key) => Ok((key.normalized(), None)),
            VehicleDescriptor::Vin(vin) => {
                if !is_valid_vin(vin) {
                    return Err(IntakeError::ValidationFailed {
                        field: "vin".to_string(),
                        reason: "VIN must be 17 characters (letters and digits, no I, O, Q)"
                            .to_string(),
                    });
                }

                let decoded = self.source.decode_vin(vin).await?;
                let (Some(model_year), Some(make), Some(model)) = (
                    decoded.model_year,
                    decoded.make.clone(),
                    decoded.model.clone(),
                ) else {
                    return Err(IntakeError::NoDataAvailable {
                        context: format!("VIN decode for {}", vin.trim().to_uppercase()),
                    });
                };

                Ok((
                    VehicleKey::new(model_year, make, model).normalized(),
                    Some(decoded),
                ))
            }
        }
    }
}
