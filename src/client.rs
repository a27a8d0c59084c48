//! # Remote Data Client Module
//!
//! ## Purpose
//! Interfaces with the NHTSA vehicle-safety endpoints (vPIC VIN decoding
//! and model lists, recalls by vehicle, complaints by vehicle), consulting
//! the local cache store before every request and falling back to stale
//! cached data when the service is unreachable.
//!
//! ## Input/Output Specification
//! - **Input**: Vehicle identifiers (VIN or year/make/model)
//! - **Output**: Normalized recall/complaint/metadata records
//! - **Degradation**: cache-first; serve-stale-on-error; a distinct
//!   "no data available" error only when no source has anything
//!
//! ## Key Features
//! - Bounded request timeout, fail-fast into the fallback path
//! - Field-by-field JSON extraction tolerant to the API's key-casing drift
//! - Empty result sets returned as empty, never defaulted
//! - Unknown response fields ignored; missing fields become empty/absent

use crate::config::ClientConfig;
use crate::errors::{IntakeError, Result};
use crate::storage::CacheStore;
use crate::utils::parse_flexible_date;
use crate::{ComplaintRecord, EndpointKind, RecallRecord, VehicleInfo, VehicleKey};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Seam between the resolver/report layer and the network, so tests can
/// substitute a stub source.
#[async_trait]
pub trait VehicleDataSource: Send + Sync {
    /// Decode a VIN into year/make/model metadata.
    async fn decode_vin(&self, vin: &str) -> Result<VehicleInfo>;

    /// Official model names for a make and model year.
    async fn models_for_make_year(&self, make: &str, model_year: i32) -> Result<Vec<String>>;

    /// Recall notices for a vehicle.
    async fn recalls_by_vehicle(&self, key: &VehicleKey) -> Result<Vec<RecallRecord>>;

    /// Consumer complaints for a vehicle.
    async fn complaints_by_vehicle(&self, key: &VehicleKey) -> Result<Vec<ComplaintRecord>>;
}

/// HTTP client for the NHTSA/vPIC endpoints with cache-backed retrieval
pub struct NhtsaClient {
    config: ClientConfig,
    http: Client,
    cache: Arc<CacheStore>,
}

impl NhtsaClient {
    /// Create a new client around an opened cache store
    pub fn new(config: ClientConfig, cache: Arc<CacheStore>) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| IntakeError::Network {
                details: e.to_string(),
            })?;

        Ok(Self {
            config,
            http,
            cache,
        })
    }

    /// Issue a GET and return the response body, mapping HTTP failures to
    /// `Network` errors.
    async fn http_get(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        debug!("Fetching {}", url);

        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| IntakeError::Network {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntakeError::Network {
                details: format!("HTTP {} from {}", status, url),
            });
        }

        response.text().await.map_err(|e| IntakeError::Network {
            details: e.to_string(),
        })
    }

    /// Cache-first fetch: fresh cache hit wins; otherwise fetch, persist,
    /// and return. Network or parse failure falls back to the newest cached
    /// payload of any age; with nothing cached the call fails with the
    /// distinct `NoDataAvailable` kind.
    async fn fetch_with_cache<T, F>(
        &self,
        query_key: &str,
        kind: EndpointKind,
        url: &str,
        query: &[(&str, String)],
        parse: F,
    ) -> Result<T>
    where
        F: Fn(&str) -> Result<T>,
    {
        if let Some(entry) = self.cache.get(query_key, kind).await? {
            match parse(&entry.payload) {
                Ok(records) => return Ok(records),
                Err(e) => warn!(
                    "Cached {} payload for {} no longer parses ({}), refetching",
                    kind, query_key, e
                ),
            }
        }

        let failure = match self.http_get(url, query).await {
            Ok(body) => match parse(&body) {
                Ok(records) => {
                    self.cache.put(query_key, kind, &body).await?;
                    return Ok(records);
                }
                Err(e) => e,
            },
            Err(e) => e,
        };

        self.serve_stale(query_key, kind, failure, parse).await
    }

    /// The fallback path: newest cached payload regardless of freshness.
    async fn serve_stale<T, F>(
        &self,
        query_key: &str,
        kind: EndpointKind,
        failure: IntakeError,
        parse: F,
    ) -> Result<T>
    where
        F: Fn(&str) -> Result<T>,
    {
        if let Some(entry) = self.cache.get_stale_ok(query_key, kind).await? {
            if let Ok(records) = parse(&entry.payload) {
                warn!(
                    "Serving stale {} data for {} (fetched {}) after failure: {}",
                    kind, query_key, entry.fetched_at, failure
                );
                return Ok(records);
            }
        }

        warn!("No usable data for {} {}: {}", kind, query_key, failure);
        Err(IntakeError::NoDataAvailable {
            context: format!("{} for {}", kind, query_key),
        })
    }
}

#[async_trait]
impl VehicleDataSource for NhtsaClient {
    async fn decode_vin(&self, vin: &str) -> Result<VehicleInfo> {
        let vin = vin.trim().to_uppercase();
        if vin.is_empty() {
            return Ok(VehicleInfo::default());
        }

        let url = format!(
            "{}/vehicles/decodevinvalues/{}",
            self.config.vpic_base_url.trim_end_matches('/'),
            vin
        );
        let query_key = format!("vin|{}", vin);

        self.fetch_with_cache(
            &query_key,
            EndpointKind::VinDecode,
            &url,
            &[("format", "json".to_string())],
            parse_vin_decode,
        )
        .await
    }

    async fn models_for_make_year(&self, make: &str, model_year: i32) -> Result<Vec<String>> {
        let make = make.trim();
        if make.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/vehicles/GetModelsForMakeYear/make/{}/modelyear/{}",
            self.config.vpic_base_url.trim_end_matches('/'),
            make,
            model_year
        );
        let body = self
            .http_get(&url, &[("format", "json".to_string())])
            .await?;
        parse_model_names(&body)
    }

    async fn recalls_by_vehicle(&self, key: &VehicleKey) -> Result<Vec<RecallRecord>> {
        let normalized = key.normalized();
        let url = format!(
            "{}/recalls/recallsByVehicle",
            self.config.nhtsa_base_url.trim_end_matches('/')
        );
        let query = [
            ("modelYear", normalized.model_year.to_string()),
            ("make", normalized.make.clone()),
            ("model", normalized.model.clone()),
        ];

        self.fetch_with_cache(
            &key.cache_key(),
            EndpointKind::Recalls,
            &url,
            &query,
            parse_recalls,
        )
        .await
    }

    async fn complaints_by_vehicle(&self, key: &VehicleKey) -> Result<Vec<ComplaintRecord>> {
        let normalized = key.normalized();
        let url = format!(
            "{}/complaints/complaintsByVehicle",
            self.config.nhtsa_base_url.trim_end_matches('/')
        );
        let query = [
            ("modelYear", normalized.model_year.to_string()),
            ("make", normalized.make.clone()),
            ("model", normalized.model.clone()),
        ];

        let key_for_parse = key.clone();
        self.fetch_with_cache(
            &key.cache_key(),
            EndpointKind::Complaints,
            &url,
            &query,
            move |body| parse_complaints(body, &key_for_parse),
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Payload mapping. The NHTSA feeds drift between key casings and between
// string/number encodings; every field is extracted explicitly with a
// default, never reflected over.
// ---------------------------------------------------------------------------

/// Result items live under `results` or `Results` depending on the feed.
fn payload_items(payload: &Value) -> Vec<&Value> {
    let items = payload
        .get("results")
        .or_else(|| payload.get("Results"))
        .and_then(Value::as_array);

    match items {
        Some(list) => list.iter().filter(|v| v.is_object()).collect(),
        None => Vec::new(),
    }
}

/// First non-empty string (or number rendered as text) among the keys.
fn string_field(obj: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match obj.get(*key) {
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// Truthy check across boolean, string, and numeric encodings.
fn bool_field(obj: &Value, keys: &[&str]) -> bool {
    for key in keys {
        match obj.get(*key) {
            Some(Value::Bool(b)) => return *b,
            Some(Value::String(s)) => {
                let s = s.trim();
                if !s.is_empty() {
                    return s.eq_ignore_ascii_case("true")
                        || s.eq_ignore_ascii_case("yes")
                        || s == "1"
                        || s.eq_ignore_ascii_case("y");
                }
            }
            Some(Value::Number(n)) => return n.as_i64().unwrap_or(0) != 0,
            _ => {}
        }
    }
    false
}

/// Non-negative count from a numeric or numeric-string field; defaults to 0.
fn count_field(obj: &Value, keys: &[&str]) -> u32 {
    for key in keys {
        match obj.get(*key) {
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_u64() {
                    return v.min(u32::MAX as u64) as u32;
                }
            }
            Some(Value::String(s)) => {
                if let Ok(v) = s.trim().parse::<u32>() {
                    return v;
                }
            }
            _ => {}
        }
    }
    0
}

/// Components arrive as either a list or a single string; join to one
/// comma-separated description.
fn components_field(obj: &Value) -> String {
    match obj.get("components").or_else(|| obj.get("Components")) {
        Some(Value::Array(list)) => {
            let parts: Vec<String> = list
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => {
                        let t = s.trim();
                        (!t.is_empty()).then(|| t.to_string())
                    }
                    _ => None,
                })
                .collect();
            parts.join(", ")
        }
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    }
}

/// Keys a state/location value may hide under in the live complaints feed.
/// Ordered most-specific first; the geo resolver normalizes the raw value.
const STATE_KEYS: &[&str] = &[
    "state",
    "State",
    "locationState",
    "LocationState",
    "consumerState",
    "ConsumerState",
    "incidentState",
    "IncidentState",
    "location",
    "Location",
    "city",
    "City",
];

fn parse_json(body: &str, endpoint: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| IntakeError::Parse {
        endpoint: endpoint.to_string(),
        details: e.to_string(),
    })
}

/// Map a complaints payload into records. Items without an ODI number are
/// dropped; everything else defaults rather than failing.
pub fn parse_complaints(body: &str, key: &VehicleKey) -> Result<Vec<ComplaintRecord>> {
    let payload = parse_json(body, "complaintsByVehicle")?;
    let normalized = key.normalized();

    let mut records = Vec::new();
    for item in payload_items(&payload) {
        let Some(odi_number) = string_field(item, &["odiNumber", "ODINumber", "odi_number"]) else {
            continue;
        };

        let date_filed = string_field(
            item,
            &["dateComplaintFiled", "dateFiled", "DateComplaintFiled"],
        )
        .and_then(|raw| parse_flexible_date(&raw));

        records.push(ComplaintRecord {
            odi_number,
            model_year: Some(normalized.model_year),
            make: normalized.make.clone(),
            model: normalized.model.clone(),
            state: string_field(item, STATE_KEYS),
            summary: string_field(item, &["summary", "Summary", "description"])
                .unwrap_or_default(),
            crash: bool_field(item, &["crash", "Crash"]),
            fire: bool_field(item, &["fire", "Fire"]),
            injuries: count_field(item, &["numberOfInjuries", "injuries"]),
            deaths: count_field(item, &["numberOfDeaths", "deaths"]),
            components: components_field(item),
            date_filed,
        });
    }

    Ok(records)
}

/// Map a recalls payload into records.
pub fn parse_recalls(body: &str) -> Result<Vec<RecallRecord>> {
    let payload = parse_json(body, "recallsByVehicle")?;

    let mut records = Vec::new();
    for item in payload_items(&payload) {
        let campaign_number =
            string_field(item, &["NHTSACampaignNumber", "nhtsaCampaignNumber"])
                .unwrap_or_default();

        let report_date = string_field(item, &["ReportReceivedDate", "reportReceivedDate"])
            .and_then(|raw| parse_flexible_date(&raw));

        records.push(RecallRecord {
            campaign_number,
            component: string_field(item, &["Component", "component"]).unwrap_or_default(),
            summary: string_field(item, &["Summary", "summary"]).unwrap_or_default(),
            report_date,
        });
    }

    Ok(records)
}

/// Map a vPIC decode payload into vehicle metadata. Blank decoder output
/// stays `None`.
pub fn parse_vin_decode(body: &str) -> Result<VehicleInfo> {
    let payload = parse_json(body, "decodevinvalues")?;
    let items = payload_items(&payload);

    let Some(row) = items.first() else {
        return Ok(VehicleInfo::default());
    };

    let model_year = string_field(row, &["ModelYear", "modelYear"])
        .and_then(|raw| raw.parse::<i32>().ok());

    Ok(VehicleInfo {
        model_year,
        make: string_field(row, &["Make", "make"]),
        model: string_field(row, &["Model", "model"]),
    })
}

/// Map a vPIC model-list payload into sorted, deduplicated model names.
pub fn parse_model_names(body: &str) -> Result<Vec<String>> {
    let payload = parse_json(body, "GetModelsForMakeYear")?;

    let mut names = BTreeSet::new();
    for item in payload_items(&payload) {
        if let Some(name) = string_field(item, &["Model_Name", "modelName"]) {
            names.insert(name.to_uppercase());
        }
    }

    Ok(names.into_iter().collect())
}
