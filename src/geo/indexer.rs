//! # Flat-File Indexer Module
//!
//! ## Purpose
//! Offline batch job over the ODI `FLAT_CMPL.txt` complaint dump:
//! aggregates per-state complaint counts by vehicle and installs them as
//! the offline geo index.
//!
//! ## Input/Output Specification
//! - **Input**: Tab-delimited dump, 49 fields per line, no header row
//! - **Output**: Installed geo index plus processed/skipped counters
//! - **Robustness**: A malformed line is skipped and counted; it never
//!   aborts the run. Only unopenable input/output paths are fatal.
//!
//! ## Field Layout
//! Of the dump's 49 documented fields only four are consumed: `MAKETXT`
//! (index 3), `MODELTXT` (4), `YEARTXT` (5), and `STATE` (13). Extra
//! trailing fields are tolerated.

use crate::config::IndexerConfig;
use crate::errors::{IntakeError, Result};
use crate::geo::index::{GeoIndexStore, VehicleGroup};
use crate::geo::states;
use crate::utils::Timer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::{debug, info, warn};

const MAKE_FIELD: usize = 3;
const MODEL_FIELD: usize = 4;
const YEAR_FIELD: usize = 5;
const STATE_FIELD: usize = 13;
const MIN_FIELDS: usize = STATE_FIELD + 1;

/// Counters emitted for operator visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerStats {
    /// Input lines read
    pub lines_read: u64,
    /// Lines that contributed a counted record
    pub records_indexed: u64,
    /// Lines skipped as malformed or implausible
    pub lines_skipped: u64,
    /// Distinct (year, make, model) groups written
    pub vehicle_groups: u64,
}

/// Offline indexer over the ODI complaint dump
pub struct FlatFileIndexer {
    config: IndexerConfig,
    output_path: PathBuf,
}

impl FlatFileIndexer {
    pub fn new(config: IndexerConfig, output_path: PathBuf) -> Self {
        Self {
            config,
            output_path,
        }
    }

    /// Run the full aggregation and install the result atomically.
    pub fn run(&self) -> Result<IndexerStats> {
        let timer = Timer::new("geo-index-build");

        let file = std::fs::File::open(&self.config.input_path).map_err(|e| {
            IntakeError::Config {
                message: format!(
                    "cannot open complaint dump {:?}: {}",
                    self.config.input_path, e
                ),
            }
        })?;
        info!("Indexing complaint dump {:?}", self.config.input_path);

        let mut stats = IndexerStats::default();
        let mut groups: BTreeMap<VehicleGroup, HashMap<String, u64>> = BTreeMap::new();

        let reader = BufReader::new(file);
        for raw_line in reader.split(b'\n') {
            let mut raw_line = raw_line?;
            if raw_line.last() == Some(&b'\r') {
                raw_line.pop();
            }
            if raw_line.is_empty() {
                continue;
            }
            stats.lines_read += 1;

            match parse_line(&raw_line) {
                Some((group, state)) => {
                    *groups.entry(group).or_default().entry(state).or_insert(0) += 1;
                    stats.records_indexed += 1;
                }
                None => stats.lines_skipped += 1,
            }

            if stats.lines_read % self.config.progress_interval_lines.max(1) == 0 {
                info!(
                    "Indexer progress: {} lines, {} indexed, {} skipped",
                    stats.lines_read, stats.records_indexed, stats.lines_skipped
                );
            }
        }

        stats.vehicle_groups = groups.len() as u64;
        GeoIndexStore::install(&self.output_path, &groups)?;

        let elapsed_ms = timer.stop();
        info!(
            "Geo index build complete: {} lines read, {} indexed, {} skipped, {} vehicle groups ({}ms)",
            stats.lines_read,
            stats.records_indexed,
            stats.lines_skipped,
            stats.vehicle_groups,
            elapsed_ms
        );

        if stats.records_indexed == 0 {
            warn!("No plausible records found in {:?}", self.config.input_path);
        }

        Ok(stats)
    }
}

/// Extract one (vehicle group, state) pair from a dump line, or `None` when
/// the line is malformed: non-UTF-8, too few fields, blank make/model, a
/// year that is not four digits, or a state outside the valid set.
fn parse_line(raw: &[u8]) -> Option<(VehicleGroup, String)> {
    let Ok(line) = std::str::from_utf8(raw) else {
        debug!("Skipping non-UTF-8 line");
        return None;
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }

    let make = fields[MAKE_FIELD].trim().to_uppercase();
    let model = fields[MODEL_FIELD].trim().to_uppercase();
    let year = fields[YEAR_FIELD].trim().to_string();
    if make.is_empty() || model.is_empty() {
        return None;
    }
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let state = states::normalize(fields[STATE_FIELD])?;

    Some((VehicleGroup { year, make, model }, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::states::is_valid_code;
    use crate::VehicleKey;
    use std::io::Write;

    /// A well-formed 49-field dump line with the given vehicle fields.
    fn dump_line(make: &str, model: &str, year: &str, state: &str) -> String {
        let mut fields = vec![""; 49];
        fields[0] = "1";
        fields[1] = "11000001";
        fields[2] = "MFR";
        fields[MAKE_FIELD] = make;
        fields[MODEL_FIELD] = model;
        fields[YEAR_FIELD] = year;
        fields[STATE_FIELD] = state;
        fields.join("\t")
    }

    fn write_dump(dir: &tempfile::TempDir, lines: &[&str]) -> IndexerConfig {
        let input = dir.path().join("FLAT_CMPL.txt");
        let mut file = std::fs::File::create(&input).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        IndexerConfig {
            input_path: input,
            progress_interval_lines: 1000,
        }
    }

    #[test]
    fn counts_good_line_and_skips_line_missing_state() {
        let dir = tempfile::tempdir().unwrap();
        let good = dump_line("HONDA", "ACCORD", "2018", "CA");
        let missing_state = dump_line("HONDA", "ACCORD", "2018", "");
        let config = write_dump(&dir, &[&good, &missing_state]);

        let output = dir.path().join("geo.db");
        let stats = FlatFileIndexer::new(config, output.clone()).run().unwrap();

        assert_eq!(stats.records_indexed, 1);
        assert_eq!(stats.lines_skipped, 1);
        assert_eq!(stats.vehicle_groups, 1);

        let store = GeoIndexStore::open(&output).unwrap();
        let counts = store
            .lookup(&VehicleKey::new(2018, "Honda", "Accord"))
            .unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].count, 1);
    }

    #[test]
    fn every_indexed_state_is_in_the_valid_set() {
        let dir = tempfile::tempdir().unwrap();
        let lines = [
            dump_line("HONDA", "ACCORD", "2018", "CA"),
            dump_line("HONDA", "ACCORD", "2018", "tx"),
            dump_line("HONDA", "ACCORD", "2018", "ZZ"),
            dump_line("HONDA", "ACCORD", "2018", "99"),
        ];
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let config = write_dump(&dir, &refs);

        let output = dir.path().join("geo.db");
        let stats = FlatFileIndexer::new(config, output.clone()).run().unwrap();
        assert_eq!(stats.records_indexed, 2);
        assert_eq!(stats.lines_skipped, 2);

        let store = GeoIndexStore::open(&output).unwrap();
        for sc in store
            .lookup(&VehicleKey::new(2018, "Honda", "Accord"))
            .unwrap()
        {
            assert!(is_valid_code(&sc.state));
        }
    }

    #[test]
    fn skips_short_and_non_utf8_lines_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("FLAT_CMPL.txt");
        {
            let mut file = std::fs::File::create(&input).unwrap();
            writeln!(file, "{}", dump_line("FORD", "F-150", "2020", "TX")).unwrap();
            writeln!(file, "too\tfew\tfields").unwrap();
            file.write_all(b"HONDA\t\xff\xfe broken bytes\n").unwrap();
        }
        let config = IndexerConfig {
            input_path: input,
            progress_interval_lines: 1000,
        };

        let stats = FlatFileIndexer::new(config, dir.path().join("geo.db"))
            .run()
            .unwrap();
        assert_eq!(stats.lines_read, 3);
        assert_eq!(stats.records_indexed, 1);
        assert_eq!(stats.lines_skipped, 2);
    }

    #[test]
    fn rejects_implausible_years() {
        assert!(parse_line(dump_line("HONDA", "ACCORD", "18", "CA").as_bytes()).is_none());
        assert!(parse_line(dump_line("HONDA", "ACCORD", "19XX", "CA").as_bytes()).is_none());
        assert!(parse_line(dump_line("HONDA", "ACCORD", "2018", "CA").as_bytes()).is_some());
    }

    #[test]
    fn missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexerConfig {
            input_path: dir.path().join("missing.txt"),
            progress_interval_lines: 1000,
        };
        let err = FlatFileIndexer::new(config, dir.path().join("geo.db"))
            .run()
            .unwrap_err();
        assert!(matches!(err, IntakeError::Config { .. }));
    }
}
