//! Denormalized lookup tables for templates, derived entirely from the index.

use crate::constants::SCHEMA_VERSION;
use crate::domain::{event_year, sort_newest_first, IndexEntry, SetlistId};
use serde::Serialize;
use std::collections::BTreeMap;

/// Group key -> ids in newest-first order.
pub type Groups = BTreeMap<String, Vec<SetlistId>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Labels {
    /// Country code -> display name.
    pub country: BTreeMap<String, String>,
}

/// The hashed part of the views file; everything except the harvest stamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Views {
    pub schema_version: u32,
    pub by_year: Groups,
    pub by_artist: Groups,
    pub by_venue: Groups,
    pub by_festival: Groups,
    pub by_country: Groups,
    pub labels: Labels,
    pub by_id: BTreeMap<SetlistId, IndexEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewsDocument {
    pub harvested_at: String,
    #[serde(flatten)]
    pub views: Views,
    pub integrity_hash: String,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn group_ids<F>(sorted: &[IndexEntry], key: F) -> Groups
where
    F: Fn(&IndexEntry) -> Option<String>,
{
    let mut groups = Groups::new();
    for item in sorted {
        if let Some(k) = key(item) {
            groups.entry(k).or_default().push(item.id.clone());
        }
    }
    groups
}

/// `"Venue, City, CC"` from whichever parts are present.
pub fn venue_key(item: &IndexEntry) -> Option<String> {
    let parts: Vec<&str> = [&item.venue, &item.city, &item.country_code]
        .into_iter()
        .filter_map(non_empty)
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// Country code, falling back to the country name.
pub fn country_key(item: &IndexEntry) -> Option<String> {
    non_empty(&item.country_code)
        .or_else(|| non_empty(&item.country))
        .map(str::to_string)
}

pub fn build_views(items: &[IndexEntry]) -> Views {
    let mut sorted = items.to_vec();
    sort_newest_first(&mut sorted);

    let mut labels = Labels::default();
    for item in &sorted {
        if let (Some(code), Some(name)) = (non_empty(&item.country_code), non_empty(&item.country)) {
            labels
                .country
                .entry(code.to_string())
                .or_insert_with(|| name.to_string());
        }
    }

    Views {
        schema_version: SCHEMA_VERSION,
        by_year: group_ids(&sorted, |it| event_year(it.event_date.as_deref()).map(str::to_string)),
        by_artist: group_ids(&sorted, |it| non_empty(&it.artist).map(str::to_string)),
        by_venue: group_ids(&sorted, venue_key),
        by_festival: group_ids(&sorted, |it| non_empty(&it.festival).map(str::to_string)),
        by_country: group_ids(&sorted, country_key),
        labels,
        by_id: sorted.into_iter().map(|it| (it.id.clone(), it)).collect(),
    }
}
