//! # Analytics Aggregation Module
//!
//! ## Purpose
//! Pure aggregation over complaint and recall records: severity tallies,
//! component frequency ranking, complaint-volume time series, and the
//! intake case-strength signal.
//!
//! ## Input/Output Specification
//! - **Input**: Slices of complaint/recall records
//! - **Output**: Summary structures ready for presentation
//! - **Purity**: No I/O; identical input yields identical output; empty
//!   input yields all-zero/empty structures, never an error

use crate::ComplaintRecord;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Summed severity indicators across a complaint set. Crash and fire count
/// one per flagged record; injuries and deaths sum the per-record counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeveritySummary {
    pub crashes: u32,
    pub fires: u32,
    pub injuries: u32,
    pub deaths: u32,
}

impl SeveritySummary {
    /// Whether any severity indicator is present at all.
    pub fn any(&self) -> bool {
        self.crashes > 0 || self.fires > 0 || self.injuries > 0 || self.deaths > 0
    }
}

/// One component with its complaint count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCount {
    pub component: String,
    pub count: u64,
}

/// Complaint count for one period of the volume series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCount {
    /// `YYYY-MM` for monthly series, `YYYY` for yearly
    pub period: String,
    pub count: u64,
}

/// Volume series granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    Monthly,
    Yearly,
}

/// Intake signal strength for attorney screening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrengthLabel {
    Strong,
    Moderate,
    Low,
}

impl std::fmt::Display for StrengthLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrengthLabel::Strong => f.write_str("Strong signal"),
            StrengthLabel::Moderate => f.write_str("Moderate signal"),
            StrengthLabel::Low => f.write_str("Low signal"),
        }
    }
}

/// Case-strength label with the indicators that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseStrength {
    pub label: StrengthLabel,
    pub reasons: Vec<String>,
}

/// Tally severity indicators across the complaint set.
pub fn severity_summary(records: &[ComplaintRecord]) -> SeveritySummary {
    let mut summary = SeveritySummary::default();

    for record in records {
        if record.crash {
            summary.crashes += 1;
        }
        if record.fire {
            summary.fires += 1;
        }
        summary.injuries = summary.injuries.saturating_add(record.injuries);
        summary.deaths = summary.deaths.saturating_add(record.deaths);
    }

    summary
}

/// Rank failing components by complaint count, descending, keeping
/// first-seen order as the tie-break. The comma-joined component text on
/// each record is split back into individual components.
pub fn component_frequency(records: &[ComplaintRecord], top_n: usize) -> Vec<ComponentCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();

    for record in records {
        for part in record.components.split(',') {
            let component = part.trim().to_uppercase();
            if component.is_empty() {
                continue;
            }
            if !counts.contains_key(&component) {
                first_seen.push(component.clone());
            }
            *counts.entry(component).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<ComponentCount> = first_seen
        .into_iter()
        .map(|component| {
            let count = counts[&component];
            ComponentCount { component, count }
        })
        .collect();

    // Stable sort preserves first-seen order within equal counts.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(top_n);
    ranked
}

/// Complaint volume per period, chronological, with interior gaps filled
/// with zero-count periods. Records without a parseable date are ignored.
pub fn volume_series(records: &[ComplaintRecord], granularity: Granularity) -> Vec<PeriodCount> {
    let mut counts: HashMap<(i32, u32), u64> = HashMap::new();

    for record in records {
        let Some(date) = record.date_filed else {
            continue;
        };
        let bucket = match granularity {
            Granularity::Monthly => (date.year(), date.month()),
            Granularity::Yearly => (date.year(), 0),
        };
        *counts.entry(bucket).or_insert(0) += 1;
    }

    let (Some(&min), Some(&max)) = (counts.keys().min(), counts.keys().max()) else {
        return Vec::new();
    };

    let mut series = Vec::new();
    let mut bucket = min;
    loop {
        let count = counts.get(&bucket).copied().unwrap_or(0);
        let period = match granularity {
            Granularity::Monthly => format!("{:04}-{:02}", bucket.0, bucket.1),
            Granularity::Yearly => format!("{:04}", bucket.0),
        };
        series.push(PeriodCount { period, count });

        if bucket == max {
            break;
        }
        bucket = match granularity {
            Granularity::Monthly => {
                if bucket.1 == 12 {
                    (bucket.0 + 1, 1)
                } else {
                    (bucket.0, bucket.1 + 1)
                }
            }
            Granularity::Yearly => (bucket.0 + 1, 0),
        };
    }

    series
}

/// Score the intake signal from recall count, complaint volume, and
/// severity indicators.
pub fn case_strength(
    recall_count: usize,
    complaint_count: usize,
    severity: &SeveritySummary,
) -> CaseStrength {
    let mut score = 0u32;
    let mut reasons = Vec::new();

    if recall_count > 0 {
        score += 2;
        reasons.push(format!("{} recall(s) found", recall_count));
    }

    if complaint_count >= 25 {
        score += 2;
        reasons.push("high complaint volume".to_string());
    } else if complaint_count >= 10 {
        score += 1;
        reasons.push("moderate complaint volume".to_string());
    }

    if severity.deaths > 0 {
        score += 3;
        reasons.push("death(s) reported".to_string());
    }
    if severity.injuries > 0 {
        score += 2;
        reasons.push("injuries reported".to_string());
    }
    if severity.fires > 0 {
        score += 2;
        reasons.push("fire(s) reported".to_string());
    }
    if severity.crashes > 0 {
        score += 1;
        reasons.push("crash(es) reported".to_string());
    }

    let label = if score >= 6 {
        StrengthLabel::Strong
    } else if score >= 3 {
        StrengthLabel::Moderate
    } else {
        StrengthLabel::Low
    };

    CaseStrength { label, reasons }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(
        odi: &str,
        crash: bool,
        fire: bool,
        injuries: u32,
        deaths: u32,
        components: &str,
        date: Option<(i32, u32, u32)>,
    ) -> ComplaintRecord {
        ComplaintRecord {
            odi_number: odi.to_string(),
            model_year: Some(2020),
            make: "honda".to_string(),
            model: "accord".to_string(),
            state: None,
            summary: String::new(),
            crash,
            fire,
            injuries,
            deaths,
            components: components.to_string(),
            date_filed: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
        }
    }

    #[test]
    fn severity_totals_are_elementwise_sums() {
        let records = vec![
            record("1", true, false, 2, 0, "", None),
            record("2", true, true, 1, 1, "", None),
            record("3", false, false, 0, 0, "", None),
        ];

        let summary = severity_summary(&records);
        assert_eq!(summary.crashes, 2);
        assert_eq!(summary.fires, 1);
        assert_eq!(summary.injuries, 3);
        assert_eq!(summary.deaths, 1);

        // Idempotent: same input, same output.
        assert_eq!(severity_summary(&records), summary);
    }

    #[test]
    fn empty_input_yields_zeroed_summaries() {
        assert_eq!(severity_summary(&[]), SeveritySummary::default());
        assert!(component_frequency(&[], 10).is_empty());
        assert!(volume_series(&[], Granularity::Monthly).is_empty());
    }

    #[test]
    fn component_frequency_orders_by_count_then_first_seen() {
        let records = vec![
            record("1", false, false, 0, 0, "ENGINE, power train", None),
            record("2", false, false, 0, 0, "BRAKES", None),
            record("3", false, false, 0, 0, "engine", None),
        ];

        let ranked = component_frequency(&records, 10);
        assert_eq!(ranked[0].component, "ENGINE");
        assert_eq!(ranked[0].count, 2);
        // POWER TRAIN and BRAKES both count 1; POWER TRAIN was seen first.
        assert_eq!(ranked[1].component, "POWER TRAIN");
        assert_eq!(ranked[2].component, "BRAKES");
    }

    #[test]
    fn component_frequency_honors_top_n() {
        let records = vec![record("1", false, false, 0, 0, "A, B, C, D", None)];
        assert_eq!(component_frequency(&records, 2).len(), 2);
    }

    #[test]
    fn monthly_series_fills_interior_gaps() {
        let records = vec![
            record("1", false, false, 0, 0, "", Some((2020, 11, 5))),
            record("2", false, false, 0, 0, "", Some((2021, 2, 10))),
            record("3", false, false, 0, 0, "", Some((2021, 2, 20))),
            record("4", false, false, 0, 0, "", None),
        ];

        let series = volume_series(&records, Granularity::Monthly);
        let periods: Vec<&str> = series.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(periods, vec!["2020-11", "2020-12", "2021-01", "2021-02"]);
        assert_eq!(series[0].count, 1);
        assert_eq!(series[1].count, 0);
        assert_eq!(series[3].count, 2);
    }

    #[test]
    fn yearly_series_uses_year_labels() {
        let records = vec![
            record("1", false, false, 0, 0, "", Some((2019, 6, 1))),
            record("2", false, false, 0, 0, "", Some((2021, 1, 1))),
        ];

        let series = volume_series(&records, Granularity::Yearly);
        let periods: Vec<&str> = series.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(periods, vec!["2019", "2020", "2021"]);
        assert_eq!(series[1].count, 0);
    }

    #[test]
    fn case_strength_thresholds() {
        let quiet = case_strength(0, 2, &SeveritySummary::default());
        assert_eq!(quiet.label, StrengthLabel::Low);

        let moderate = case_strength(1, 12, &SeveritySummary::default());
        assert_eq!(moderate.label, StrengthLabel::Moderate);

        let severe = case_strength(
            1,
            30,
            &SeveritySummary {
                crashes: 3,
                fires: 1,
                injuries: 4,
                deaths: 1,
            },
        );
        assert_eq!(severe.label, StrengthLabel::Strong);
        assert!(severe.reasons.iter().any(|r| r.contains("death")));
    }
}
