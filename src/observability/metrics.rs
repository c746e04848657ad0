//! Harvest metrics, recorded through the `metrics` facade.
//!
//! Nothing is exported unless the embedding process installs a recorder; without
//! one these calls are no-ops.

use std::fmt;

/// Every metric name the harvester emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    PagesFetched,
    RateLimited,
    RecordsHarvested,
    RecordsDropped,
    DetailWrites,
    DetailSkips,
    IndexWrites,
    ViewsWrites,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricName::PagesFetched => "setlists_pages_fetched_total",
            MetricName::RateLimited => "setlists_rate_limited_total",
            MetricName::RecordsHarvested => "setlists_records_harvested_total",
            MetricName::RecordsDropped => "setlists_records_dropped_total",
            MetricName::DetailWrites => "setlists_detail_writes_total",
            MetricName::DetailSkips => "setlists_detail_skips_total",
            MetricName::IndexWrites => "setlists_index_writes_total",
            MetricName::ViewsWrites => "setlists_views_writes_total",
        };
        f.write_str(name)
    }
}

fn incr(name: MetricName, by: u64) {
    ::metrics::counter!(name.to_string()).increment(by);
}

pub mod fetch {
    use super::{incr, MetricName};

    pub fn page_fetched() {
        incr(MetricName::PagesFetched, 1);
    }

    pub fn rate_limited() {
        incr(MetricName::RateLimited, 1);
    }

    pub fn records_dropped(n: usize) {
        incr(MetricName::RecordsDropped, n as u64);
    }
}

pub mod store {
    use super::{incr, MetricName};

    pub fn records_harvested(n: usize) {
        incr(MetricName::RecordsHarvested, n as u64);
    }

    pub fn detail_written() {
        incr(MetricName::DetailWrites, 1);
    }

    pub fn detail_skipped() {
        incr(MetricName::DetailSkips, 1);
    }

    pub fn index_written() {
        incr(MetricName::IndexWrites, 1);
    }

    pub fn views_written() {
        incr(MetricName::ViewsWrites, 1);
    }
}
