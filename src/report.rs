//! Per-source outcome tracking. Every job folds what happened to each of
//! its sources into a `RunReport` and logs the summary at the end;
//! failure CSVs are derived from the same entries.

use csv::Writer;

use crate::model;

/// What became of a single source (endpoint, snapshot file or ticker).
#[derive(Debug)]
pub enum SourceOutcome {
    /// Rows extracted, normalized and queued for the loader.
    Loaded { rows: usize },
    /// Nothing usable, by design or by data (no table, no date, empty day).
    Skipped { reason: String },
    /// Gave up after the stated number of attempts.
    Failed {
        reason: String,
        status_code: Option<u16>,
        attempts: u32,
    },
}

#[derive(Debug)]
pub struct SourceResult {
    pub source: String,
    pub outcome: SourceOutcome,
    pub timestamp: String, // Exchange-local time the outcome was recorded.
}

#[derive(Debug, Default)]
pub struct RunReport {
    results: Vec<SourceResult>,
}

impl RunReport {
    pub fn new() -> Self {
        RunReport::default()
    }

    pub fn record(&mut self, source: &str, timestamp: String, outcome: SourceOutcome) {
        self.results.push(SourceResult {
            source: source.to_string(),
            outcome,
            timestamp,
        });
    }

    pub fn loaded_sources(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, SourceOutcome::Loaded { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, SourceOutcome::Skipped { .. }))
            .count()
    }

    pub fn rows_loaded(&self) -> usize {
        self.results
            .iter()
            .map(|r| match r.outcome {
                SourceOutcome::Loaded { rows } => rows,
                _ => 0,
            })
            .sum()
    }

    pub fn total_attempts(&self) -> u32 {
        self.results
            .iter()
            .map(|r| match r.outcome {
                SourceOutcome::Failed { attempts, .. } => attempts,
                _ => 1,
            })
            .sum()
    }

    pub fn failures(&self) -> Vec<&SourceResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, SourceOutcome::Failed { .. }))
            .collect()
    }

    /// Logs the final report for a job run.
    pub fn log_summary(&self, job: &str) {
        log::info!(
            "{job}: {} sources processed, {} loaded, {} skipped, {} failed, {} rows appended, {} total attempts",
            self.results.len(),
            self.loaded_sources(),
            self.skipped(),
            self.failures().len(),
            self.rows_loaded(),
            self.total_attempts(),
        );
        for result in &self.results {
            if let SourceOutcome::Skipped { reason } = &result.outcome {
                log::info!("{job}: skipped {}: {}", result.source, reason);
            }
        }
    }

    /// Writes the failed sources to a CSV report. No file is written when
    /// every source succeeded.
    pub fn write_failure_csv(&self, path: &str) -> model::Result<usize> {
        let failures = self.failures();
        if failures.is_empty() {
            return Ok(0);
        }

        let mut writer = Writer::from_path(path)?;
        writer.write_record(["url", "error", "status_code", "attempts", "timestamp"])?;
        for result in &failures {
            if let SourceOutcome::Failed {
                reason,
                status_code,
                attempts,
            } = &result.outcome
            {
                let status = status_code
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "N/A".into());
                let attempts = attempts.to_string();
                writer.write_record([
                    result.source.as_str(),
                    reason.as_str(),
                    status.as_str(),
                    attempts.as_str(),
                    result.timestamp.as_str(),
                ])?;
            }
        }
        writer.flush()?;
        Ok(failures.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp() -> String {
        "2025-03-14 17:00:00".to_string()
    }

    #[test]
    fn failure_report_has_exactly_the_failed_entries() {
        // N = 5 endpoints, M = 2 permanent failures: the report holds
        // exactly M entries and at most N - M sources contribute rows.
        let mut report = RunReport::new();
        report.record("u1", stamp(), SourceOutcome::Loaded { rows: 1 });
        report.record("u2", stamp(), SourceOutcome::Failed {
            reason: "HTTP 503".into(),
            status_code: Some(503),
            attempts: 50,
        });
        report.record("u3", stamp(), SourceOutcome::Loaded { rows: 1 });
        report.record("u4", stamp(), SourceOutcome::Failed {
            reason: "empty payload".into(),
            status_code: Some(200),
            attempts: 50,
        });
        report.record("u5", stamp(), SourceOutcome::Skipped { reason: "no date".into() });

        assert_eq!(report.failures().len(), 2);
        assert!(report.loaded_sources() <= 3);
        assert_eq!(report.rows_loaded(), 2);
        assert_eq!(report.total_attempts(), 103);
    }

    #[test]
    fn failure_csv_written_only_when_failures_exist() {
        let path = std::env::temp_dir().join(format!("afx_failed_{}.csv", std::process::id()));
        let path = path.to_string_lossy().into_owned();

        let mut clean = RunReport::new();
        clean.record("u1", stamp(), SourceOutcome::Loaded { rows: 3 });
        assert_eq!(clean.write_failure_csv(&path).unwrap(), 0);

        let mut failing = RunReport::new();
        failing.record("u1", stamp(), SourceOutcome::Failed {
            reason: "timeout".into(),
            status_code: None,
            attempts: 50,
        });
        assert_eq!(failing.write_failure_csv(&path).unwrap(), 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("url,error,status_code,attempts,timestamp"));
        assert!(contents.contains("timeout"));
        assert!(contents.contains("N/A"));
        std::fs::remove_file(&path).ok();
    }
}
