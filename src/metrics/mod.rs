
mod aggregator;
mod probe_record;
mod summary;

pub(crate) use aggregator::ResultAggregator;
pub(crate) use probe_record::{Outcome, ProbeRecord};
pub(crate) use summary::{Summary, SummaryReport};
