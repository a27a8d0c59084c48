//! # State Code Vocabulary
//!
//! ## Purpose
//! The fixed set of valid US state and territory codes, plus normalization
//! of the free-form location values the complaint feeds carry. Unknown or
//! blank values normalize to `None`; they are never merged into a valid
//! state.

/// Valid two-letter codes: 50 states, DC, and the inhabited territories.
/// Sorted for binary search.
pub const VALID_STATE_CODES: &[&str] = &[
    "AK", "AL", "AR", "AS", "AZ", "CA", "CO", "CT", "DC", "DE", "FL", "GA", "GU", "HI", "IA",
    "ID", "IL", "IN", "KS", "KY", "LA", "MA", "MD", "ME", "MI", "MN", "MO", "MP", "MS", "MT",
    "NC", "ND", "NE", "NH", "NJ", "NM", "NV", "NY", "OH", "OK", "OR", "PA", "PR", "RI", "SC",
    "SD", "TN", "TX", "UT", "VA", "VI", "VT", "WA", "WI", "WV", "WY",
];

/// Membership test against the fixed valid-state set.
pub fn is_valid_code(code: &str) -> bool {
    VALID_STATE_CODES.binary_search(&code).is_ok()
}

/// Full state name (uppercase) to code.
fn name_to_code(name: &str) -> Option<&'static str> {
    let code = match name {
        "ALABAMA" => "AL",
        "ALASKA" => "AK",
        "ARIZONA" => "AZ",
        "ARKANSAS" => "AR",
        "CALIFORNIA" => "CA",
        "COLORADO" => "CO",
        "CONNECTICUT" => "CT",
        "DELAWARE" => "DE",
        "FLORIDA" => "FL",
        "GEORGIA" => "GA",
        "HAWAII" => "HI",
        "IDAHO" => "ID",
        "ILLINOIS" => "IL",
        "INDIANA" => "IN",
        "IOWA" => "IA",
        "KANSAS" => "KS",
        "KENTUCKY" => "KY",
        "LOUISIANA" => "LA",
        "MAINE" => "ME",
        "MARYLAND" => "MD",
        "MASSACHUSETTS" => "MA",
        "MICHIGAN" => "MI",
        "MINNESOTA" => "MN",
        "MISSISSIPPI" => "MS",
        "MISSOURI" => "MO",
        "MONTANA" => "MT",
        "NEBRASKA" => "NE",
        "NEVADA" => "NV",
        "NEW HAMPSHIRE" => "NH",
        "NEW JERSEY" => "NJ",
        "NEW MEXICO" => "NM",
        "NEW YORK" => "NY",
        "NORTH CAROLINA" => "NC",
        "NORTH DAKOTA" => "ND",
        "OHIO" => "OH",
        "OKLAHOMA" => "OK",
        "OREGON" => "OR",
        "PENNSYLVANIA" => "PA",
        "RHODE ISLAND" => "RI",
        "SOUTH CAROLINA" => "SC",
        "SOUTH DAKOTA" => "SD",
        "TENNESSEE" => "TN",
        "TEXAS" => "TX",
        "UTAH" => "UT",
        "VERMONT" => "VT",
        "VIRGINIA" => "VA",
        "WASHINGTON" => "WA",
        "WEST VIRGINIA" => "WV",
        "WISCONSIN" => "WI",
        "WYOMING" => "WY",
        "DISTRICT OF COLUMBIA" => "DC",
        "PUERTO RICO" => "PR",
        "GUAM" => "GU",
        "AMERICAN SAMOA" => "AS",
        "VIRGIN ISLANDS" => "VI",
        "U.S. VIRGIN ISLANDS" => "VI",
        "NORTHERN MARIANA ISLANDS" => "MP",
        _ => return None,
    };
    Some(code)
}

/// Normalize a raw location value to a valid state code.
///
/// Accepts two-letter codes, full state names, and trailing `"City, ST"`
/// forms. Anything else, including blank input, yields `None`.
pub fn normalize(raw: &str) -> Option<String> {
    let value = raw.trim().to_uppercase();
    if value.is_empty() {
        return None;
    }

    if value.len() == 2 && is_valid_code(&value) {
        return Some(value);
    }

    if let Some(code) = name_to_code(&value) {
        return Some(code.to_string());
    }

    // "Sacramento, CA" or "Albany, New York": try the last comma segment.
    if value.contains(',') {
        if let Some(last) = value.split(',').map(str::trim).filter(|p| !p.is_empty()).last() {
            if last.len() == 2 && is_valid_code(last) {
                return Some(last.to_string());
            }
            if let Some(code) = name_to_code(last) {
                return Some(code.to_string());
            }
        }
    }

    None
}
