use std::collections::BTreeMap;

use serde::Serialize;

use super::probe_record::ProbeRecord;

/// Per-URL statistics, keyed and ordered by URL.
pub(crate) type SummaryReport = BTreeMap<String, Summary>;

/// Aggregated statistics of every probe recorded for one URL.
/// Times are in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct Summary {
    pub success: usize,
    pub failed: usize,
    pub errors: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl Summary {
    pub(crate) fn from_records(records: &[ProbeRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let mut summary = Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            ..Self::default()
        };
        let mut sum = 0f64;
        for record in records {
            if record.is_success() {
                summary.success += 1;
            } else if record.is_failed() {
                summary.failed += 1;
            } else {
                debug_assert!(record.is_error());
                summary.errors += 1;
            }

            let elapsed = record.elapsed_secs();
            summary.min = summary.min.min(elapsed);
            summary.max = summary.max.max(elapsed);
            sum += elapsed;
        }
        summary.avg = sum / records.len() as f64;
        summary
    }

    pub(crate) fn total(&self) -> usize {
        self.success + self.failed + self.errors
    }
}
