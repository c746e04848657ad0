use crate::constants::{SCHEMA_VERSION, UNKNOWN_COUNTRY};
use crate::domain::IndexEntry;
use serde::ser::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};

/// Country -> record count, largest first. Serialized as a JSON object in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryCounts(pub Vec<(String, usize)>);

impl CountryCounts {
    pub fn get(&self, code: &str) -> Option<usize> {
        self.0.iter().find(|(k, _)| k == code).map(|(_, n)| *n)
    }
}

impl Serialize for CountryCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupSummary {
    pub total: usize,
    pub festivals: usize,
    pub unique_artists: usize,
    pub by_country: CountryCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupDocument {
    pub schema_version: u32,
    pub harvested_at: String,
    pub username: String,
    pub summary: RollupSummary,
}

pub fn summarize(items: &[IndexEntry]) -> RollupSummary {
    let festivals = items
        .iter()
        .filter(|i| i.festival.as_deref().is_some_and(|f| !f.is_empty()))
        .count();
    let unique_artists = items
        .iter()
        .filter_map(|i| i.artist.as_deref().filter(|a| !a.is_empty()))
        .collect::<HashSet<_>>()
        .len();

    // First-seen order, then a stable sort, so equal counts keep index order
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for item in items {
        let code = item
            .country_code
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(UNKNOWN_COUNTRY);
        let n = counts.entry(code.to_string()).or_insert_with(|| {
            order.push(code.to_string());
            0
        });
        *n += 1;
    }
    let mut by_country: Vec<(String, usize)> = order
        .into_iter()
        .map(|code| {
            let n = counts.get(&code).copied().unwrap_or(0);
            (code, n)
        })
        .collect();
    by_country.sort_by(|a, b| b.1.cmp(&a.1));

    RollupSummary {
        total: items.len(),
        festivals,
        unique_artists,
        by_country: CountryCounts(by_country),
    }
}

pub fn build_rollup(items: &[IndexEntry], username: &str, harvested_at: &str) -> RollupDocument {
    RollupDocument {
        schema_version: SCHEMA_VERSION,
        harvested_at: harvested_at.to_string(),
        username: username.to_string(),
        summary: summarize(items),
    }
}
