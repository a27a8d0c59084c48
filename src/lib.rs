//! # Vehicle Defect Intelligence Core
//!
//! ## Overview
//! This library implements the data core of a legal-intake dashboard for
//! vehicle defect matters: it queries the NHTSA vehicle-safety APIs, caches
//! results in an embedded store, and aggregates severity, geographic, and
//! trend summaries for attorney screening.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `client`: Remote data client for the NHTSA/vPIC endpoints
//! - `storage`: Cache-backed persistence for fetched API payloads
//! - `analytics`: Severity, component, and trend aggregation
//! - `geo`: Offline state-count indexing and geographic resolution
//! - `search`: Keyword and severity filtering over complaint narratives
//! - `report`: Assembly of the full intake report for presentation
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: Vehicle identifiers (VIN or year/make/model), the ODI
//!   FLAT_CMPL complaint dump (offline indexing)
//! - **Output**: Structured recall/complaint records, severity summaries,
//!   state-ranked counts with provenance, time series, filtered search hits
//! - **Degradation**: Per-query failures yield explicit empty or stale
//!   results; nothing in the core terminates an interactive session
//!
//! ## Usage
//! ```rust,no_run
//! use defect_intel::{Config, report::IntakeService, VehicleDescriptor, VehicleKey};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.toml")?;
//!     let service = IntakeService::new(&config).await?;
//!     let key = VehicleKey::new(2021, "Toyota", "Camry");
//!     let report = service.build_report(&VehicleDescriptor::YearMakeModel(key)).await?;
//!     println!("{} complaints", report.complaint_count);
//!     Ok(())
//! }
//! ```

// Core modules
pub mod config;
pub mod errors;
pub mod client;
pub mod storage;
pub mod analytics;
pub mod geo;
pub mod search;
pub mod report;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use errors::{IntakeError, Result};
pub use geo::resolver::{GeoProvenance, GeoSummary};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single consumer complaint as returned by the NHTSA complaints endpoint
/// or reconstructed from a cached payload. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintRecord {
    /// ODI complaint number (the record's natural identifier)
    pub odi_number: String,
    /// Model year, when the feed carries one
    pub model_year: Option<i32>,
    /// Vehicle make
    pub make: String,
    /// Vehicle model
    pub model: String,
    /// Reporting state, frequently absent from the live feed
    pub state: Option<String>,
    /// Free-text consumer narrative
    pub summary: String,
    /// Crash reported
    pub crash: bool,
    /// Fire reported
    pub fire: bool,
    /// Number of injuries reported
    pub injuries: u32,
    /// Number of deaths reported
    pub deaths: u32,
    /// Affected components, comma-joined
    pub components: String,
    /// Date the complaint was filed
    pub date_filed: Option<NaiveDate>,
}

/// A manufacturer/government recall notice for a vehicle. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallRecord {
    /// NHTSA campaign number
    pub campaign_number: String,
    /// Affected component
    pub component: String,
    /// Recall summary text
    pub summary: String,
    /// Date NHTSA received the report
    pub report_date: Option<NaiveDate>,
}

/// Decoded vehicle metadata from the vPIC VIN decoder. Fields the decoder
/// leaves blank stay `None`; they are never guessed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub model_year: Option<i32>,
    pub make: Option<String>,
    pub model: Option<String>,
}

/// Year/make/model triple used as the primary query and cache key.
/// Equality is value-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleKey {
    pub model_year: i32,
    pub make: String,
    pub model: String,
}

impl VehicleKey {
    pub fn new(model_year: i32, make: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model_year,
            make: make.into(),
            model: model.into(),
        }
    }

    /// Normalized form: make/model trimmed and lowercased so equivalent
    /// queries collide on the same cache entry.
    pub fn normalized(&self) -> Self {
        Self {
            model_year: self.model_year,
            make: self.make.trim().to_lowercase(),
            model: self.model.trim().to_lowercase(),
        }
    }

    /// Stable cache-key string for this vehicle.
    pub fn cache_key(&self) -> String {
        let n = self.normalized();
        format!("{}|{}|{}", n.model_year, n.make, n.model)
    }
}

impl std::fmt::Display for VehicleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.model_year, self.make, self.model)
    }
}

/// How the caller identifies a vehicle: a raw VIN or an explicit
/// year/make/model triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleDescriptor {
    Vin(String),
    YearMakeModel(VehicleKey),
}

impl VehicleDescriptor {
    /// Stable cache-key string. VINs are trimmed and uppercased.
    pub fn cache_key(&self) -> String {
        match self {
            VehicleDescriptor::Vin(vin) => format!("vin|{}", vin.trim().to_uppercase()),
            VehicleDescriptor::YearMakeModel(key) => key.cache_key(),
        }
    }
}

/// Complaint count for a single state. The code is always a member of the
/// fixed US state/territory set (see [`geo::states`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCount {
    /// Two-letter state code, uppercase
    pub state: String,
    /// Non-negative complaint count
    pub count: u64,
}

/// Logical remote endpoint, used to namespace cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointKind {
    VinDecode,
    Recalls,
    Complaints,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::VinDecode => "vin_decode",
            EndpointKind::Recalls => "recalls",
            EndpointKind::Complaints => "complaints",
        }
    }
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
