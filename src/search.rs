//! # Symptom Search Module
//!
//! ## Purpose
//! Keyword and severity filtering over complaint narratives so intake staff
//! can find similar cases by symptom.
//!
//! ## Input/Output Specification
//! - **Input**: Complaint records, optional keyword, severity filters, limit
//! - **Output**: Ordered, bounded subsets of the input records
//! - **Ordering**: `search` is most-recent-first; the relevance and
//!   severity rankers provide the preview orderings

use crate::utils::normalize_text;
use crate::ComplaintRecord;
use serde::{Deserialize, Serialize};

/// Severity requirements a record must satisfy to pass the filter. Every
/// requested field must hold (intersection semantics); unset fields do not
/// constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityFilters {
    /// Require the crash flag to equal this value
    pub crash: Option<bool>,
    /// Require the fire flag to equal this value
    pub fire: Option<bool>,
    /// Require at least one injury (true) or none (false)
    pub injury: Option<bool>,
    /// Require at least one death (true) or none (false)
    pub death: Option<bool>,
    /// Require at least this many injuries
    pub min_injuries: Option<u32>,
}

impl SeverityFilters {
    fn matches(&self, record: &ComplaintRecord) -> bool {
        if let Some(crash) = self.crash {
            if record.crash != crash {
                return false;
            }
        }
        if let Some(fire) = self.fire {
            if record.fire != fire {
                return false;
            }
        }
        if let Some(injury) = self.injury {
            if (record.injuries > 0) != injury {
                return false;
            }
        }
        if let Some(death) = self.death {
            if (record.deaths > 0) != death {
                return false;
            }
        }
        if let Some(min) = self.min_injuries {
            if record.injuries < min {
                return false;
            }
        }
        true
    }
}

/// Filter records by keyword and severity, most-recent-first.
///
/// The keyword is a case-insensitive substring match over the narrative;
/// an empty or absent keyword applies no keyword filtering. Ties on date
/// (including undated records, which sort last) keep original fetch order.
pub fn search(
    records: &[ComplaintRecord],
    keyword: Option<&str>,
    filters: &SeverityFilters,
    limit: usize,
) -> Vec<ComplaintRecord> {
    let needle = keyword
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_lowercase);

    let mut hits: Vec<(usize, &ComplaintRecord)> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| filters.matches(record))
        .filter(|(_, record)| match &needle {
            Some(needle) => record.summary.to_lowercase().contains(needle),
            None => true,
        })
        .collect();

    // Most recent first; undated records last; stable on fetch order.
    hits.sort_by(|(ia, a), (ib, b)| {
        b.date_filed
            .cmp(&a.date_filed)
            .then_with(|| ia.cmp(ib))
    });

    hits.into_iter()
        .take(limit)
        .map(|(_, record)| record.clone())
        .collect()
}

/// Rank records by multi-term keyword relevance, then severity.
///
/// Each query term that appears in the normalized narrative scores one
/// point; records with no matching term are dropped. Equal scores fall
/// back to deaths, injuries, fire, crash, descending.
pub fn keyword_rank(records: &[ComplaintRecord], query: &str, top_k: usize) -> Vec<ComplaintRecord> {
    let normalized_query = normalize_text(query);
    let terms: Vec<&str> = normalized_query.split(' ').filter(|t| !t.is_empty()).collect();

    if terms.is_empty() {
        return records.iter().take(top_k).cloned().collect();
    }

    let mut scored: Vec<(u32, &ComplaintRecord)> = records
        .iter()
        .filter_map(|record| {
            let narrative = normalize_text(&record.summary);
            let score = terms.iter().filter(|t| narrative.contains(*t)).count() as u32;
            (score > 0).then_some((score, record))
        })
        .collect();

    scored.sort_by(|(sa, a), (sb, b)| {
        sb.cmp(sa)
            .then_with(|| severity_rank(b).cmp(&severity_rank(a)))
    });

    scored
        .into_iter()
        .take(top_k)
        .map(|(_, record)| record.clone())
        .collect()
}

/// Order records by severity: deaths, injuries, fire, crash, descending.
/// Used for the complaint preview when no keyword is given.
pub fn rank_by_severity(records: &[ComplaintRecord]) -> Vec<ComplaintRecord> {
    let mut ranked: Vec<&ComplaintRecord> = records.iter().collect();
    ranked.sort_by(|a, b| severity_rank(b).cmp(&severity_rank(a)));
    ranked.into_iter().cloned().collect()
}

fn severity_rank(record: &ComplaintRecord) -> (u32, u32, bool, bool) {
    (record.deaths, record.injuries, record.fire, record.crash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(
        odi: &str,
        summary: &str,
        crash: bool,
        fire: bool,
        injuries: u32,
        deaths: u32,
        date: Option<(i32, u32, u32)>,
    ) -> ComplaintRecord {
        ComplaintRecord {
            odi_number: odi.to_string(),
            model_year: Some(2020),
            make: "honda".to_string(),
            model: "accord".to_string(),
            state: None,
            summary: summary.to_string(),
            crash,
            fire,
            injuries,
            deaths,
            components: String::new(),
            date_filed: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
        }
    }

    #[test]
    fn keyword_and_severity_intersect() {
        let records = vec![
            record("1", "Airbag failed to deploy in crash", true, false, 1, 0, Some((2021, 3, 1))),
            record("2", "AIRBAG warning light on", false, false, 0, 0, Some((2021, 5, 1))),
            record("3", "Brakes grinding", true, false, 0, 0, Some((2021, 6, 1))),
            record("4", "airbag deployed without impact", true, false, 0, 0, Some((2020, 1, 1))),
        ];

        let filters = SeverityFilters {
            crash: Some(true),
            ..Default::default()
        };
        let hits = search(&records, Some("airbag"), &filters, 25);

        let ids: Vec<&str> = hits.iter().map(|r| r.odi_number.as_str()).collect();
        // Only crash-flagged airbag narratives, newest first.
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[test]
    fn absent_keyword_applies_no_keyword_filter() {
        let records = vec![
            record("1", "anything", false, false, 0, 0, Some((2021, 1, 2))),
            record("2", "else", false, false, 0, 0, Some((2021, 1, 1))),
        ];

        let hits = search(&records, None, &SeverityFilters::default(), 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].odi_number, "1");
    }

    #[test]
    fn limit_bounds_the_result() {
        let records: Vec<ComplaintRecord> = (0..10)
            .map(|i| record(&i.to_string(), "stalling", false, false, 0, 0, Some((2021, 1, 1 + i))))
            .collect();

        assert_eq!(search(&records, None, &SeverityFilters::default(), 3).len(), 3);
    }

    #[test]
    fn undated_records_sort_last_with_stable_fetch_order() {
        let records = vec![
            record("a", "x", false, false, 0, 0, None),
            record("b", "x", false, false, 0, 0, Some((2021, 1, 1))),
            record("c", "x", false, false, 0, 0, None),
        ];

        let hits = search(&records, None, &SeverityFilters::default(), 10);
        let ids: Vec<&str> = hits.iter().map(|r| r.odi_number.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn equal_dates_keep_fetch_order() {
        let records = vec![
            record("first", "x", false, false, 0, 0, Some((2021, 7, 4))),
            record("second", "x", false, false, 0, 0, Some((2021, 7, 4))),
        ];

        let hits = search(&records, None, &SeverityFilters::default(), 10);
        assert_eq!(hits[0].odi_number, "first");
        assert_eq!(hits[1].odi_number, "second");
    }

    #[test]
    fn min_injuries_filters_below_threshold() {
        let records = vec![
            record("1", "x", false, false, 3, 0, None),
            record("2", "x", false, false, 1, 0, None),
        ];

        let filters = SeverityFilters {
            min_injuries: Some(2),
            ..Default::default()
        };
        let hits = search(&records, None, &filters, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].odi_number, "1");
    }

    #[test]
    fn keyword_rank_scores_terms_then_severity() {
        let records = vec![
            record("low", "transmission noise", false, false, 0, 0, None),
            record("both", "transmission slipping on highway", false, false, 0, 0, None),
            record("severe", "transmission slipping badly", false, false, 0, 2, None),
            record("none", "paint peeling", false, false, 0, 0, None),
        ];

        let ranked = keyword_rank(&records, "transmission slipping", 10);
        let ids: Vec<&str> = ranked.iter().map(|r| r.odi_number.as_str()).collect();
        // Two-term matches beat one-term; deaths break the tie.
        assert_eq!(ids, vec!["severe", "both", "low"]);
    }

    #[test]
    fn severity_ranking_orders_deaths_first() {
        let records = vec![
            record("crash", "x", true, false, 0, 0, None),
            record("death", "x", false, false, 0, 1, None),
            record("injury", "x", false, false, 2, 0, None),
        ];

        let ranked = rank_by_severity(&records);
        let ids: Vec<&str> = ranked.iter().map(|r| r.odi_number.as_str()).collect();
        assert_eq!(ids, vec!["death", "injury", "crash"]);
    }
}
