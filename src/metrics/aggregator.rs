use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rayon::prelude::*;
use tracing::trace;

use super::probe_record::ProbeRecord;
use super::summary::{Summary, SummaryReport};

/// Collects the records of every probe, keyed by URL.
///
/// A single lock covers both appending and summarising, so a summary never
/// observes a half-finished append. Once sealed, further records are dropped;
/// this keeps probes that are torn down during a shutdown from polluting the
/// partial results.
#[derive(Debug, Default)]
pub(crate) struct ResultAggregator {
    records: Mutex<HashMap<String, Vec<ProbeRecord>>>,
    sealed: AtomicBool,
}

impl ResultAggregator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, Vec<ProbeRecord>>> {
        // a panicking writer cannot leave a half-pushed Vec behind
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `record` to the sequence kept for `url`. Returns `false` when
    /// the aggregator is sealed and the record was discarded.
    pub(crate) fn add_record(&self, url: &str, record: ProbeRecord) -> bool {
        let mut records = self.records();
        if self.sealed.load(Ordering::Acquire) {
            trace!(url, "aggregator sealed, discarding record");
            return false;
        }
        match records.get_mut(url) {
            Some(sequence) => sequence.push(record),
            None => {
                records.insert(url.to_owned(), vec![record]);
            }
        }
        true
    }

    pub(crate) fn seal(&self) {
        let _records = self.records();
        self.sealed.store(true, Ordering::Release);
    }

    pub(crate) fn generate_summary(&self) -> SummaryReport {
        let records = self.records();
        records
            .par_iter()
            .map(|(url, sequence)| (url.clone(), Summary::from_records(sequence)))
            .collect()
    }

    pub(crate) fn total_records(&self) -> usize {
        self.records().values().map(Vec::len).sum()
    }

    #[cfg(test)]
    pub(crate) fn records_for(&self, url: &str) -> usize {
        self.records().get(url).map_or(0, Vec::len)
    }
}
