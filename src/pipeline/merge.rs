use crate::domain::{is_after, sort_newest_first, IndexEntry, NormalizedRecord, SetlistId};
use std::collections::{HashMap, HashSet};

/// Result of folding one harvest into the previous index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Every known record, newest first.
    pub items: Vec<IndexEntry>,
    /// Ids whose detail document must be (re)written, in first-marked order.
    pub detail_writes: Vec<SetlistId>,
}

/// Upserts `harvested` into `previous`, keyed by id.
///
/// A record is marked for a detail rewrite when it is new, when its `lastUpdated`
/// is after `last_harvest`, or when its projection differs from the stored entry.
/// Entries are never removed. With `full_rescan`, every known id is marked.
pub fn merge_index(
    previous: &[IndexEntry],
    harvested: &[NormalizedRecord],
    last_harvest: Option<&str>,
    full_rescan: bool,
) -> MergeOutcome {
    let mut items: Vec<IndexEntry> = Vec::with_capacity(previous.len() + harvested.len());
    let mut position: HashMap<SetlistId, usize> = HashMap::new();
    for entry in previous {
        match position.get(&entry.id) {
            // A corrupt index could repeat an id; keep the later copy in the first slot
            Some(&at) => items[at] = entry.clone(),
            None => {
                position.insert(entry.id.clone(), items.len());
                items.push(entry.clone());
            }
        }
    }

    let mut marked: HashSet<SetlistId> = HashSet::new();
    let mut detail_writes = Vec::new();
    for record in harvested {
        let projected = IndexEntry::from(record);
        let rewrite = match position.get(&record.id) {
            Some(&at) => {
                let changed = items[at] != projected;
                items[at] = projected;
                changed || is_after(record.last_updated.as_deref(), last_harvest)
            }
            None => {
                position.insert(record.id.clone(), items.len());
                items.push(projected);
                true
            }
        };
        if rewrite && marked.insert(record.id.clone()) {
            detail_writes.push(record.id.clone());
        }
    }

    sort_newest_first(&mut items);

    if full_rescan {
        detail_writes = items.iter().map(|i| i.id.clone()).collect();
    }

    MergeOutcome { items, detail_writes }
}
