//! Decides how far to page through the attended listing on each run.
//!
//! The API lists newest-first, so a delta run can stop as soon as it reaches a
//! page holding nothing new. The first `refresh_pages` pages are always fetched
//! to pick up edits to recent records that are already known.

use crate::app::ports::{AttendedPage, AttendedSource};
use crate::domain::{is_after, NormalizedRecord, SetlistId};
use crate::error::Result;
use std::collections::HashSet;
use tracing::{debug, info};

/// What the previous harvest already knows.
#[derive(Debug, Clone, Default)]
pub struct DeltaPlan {
    pub known_ids: HashSet<SetlistId>,
    pub refresh_pages: u32,
    pub last_harvest: Option<String>,
}

impl DeltaPlan {
    /// Stop rule applied after fetching page `page_no` (1-based).
    pub fn should_stop(&self, page_no: u32, page: &AttendedPage) -> bool {
        if page.is_last {
            return true;
        }
        if page_no < self.refresh_pages {
            return false;
        }
        let all_known = page.records.iter().all(|r| self.known_ids.contains(&r.id));
        let all_older = match self.last_harvest.as_deref() {
            Some(since) => page
                .records
                .iter()
                .all(|r| !is_after(r.last_updated.as_deref(), Some(since))),
            None => false,
        };
        all_known && all_older
    }
}

#[derive(Debug, Clone)]
pub enum SyncMode {
    /// Every page until the listing runs out, ignoring known state.
    Full,
    Delta(DeltaPlan),
}

/// Records gathered by one paging pass.
#[derive(Debug, Clone, Default)]
pub struct Harvested {
    pub records: Vec<NormalizedRecord>,
    pub pages: u32,
}

/// Fetch pages strictly in order from page 1 until `mode` says to stop.
pub async fn collect_pages<S>(source: &S, username: &str, mode: &SyncMode) -> Result<Harvested>
where
    S: AttendedSource + ?Sized,
{
    let mut harvested = Harvested::default();
    let mut page_no: u32 = 1;
    loop {
        let page = source.fetch_page(username, page_no).await?;
        harvested.pages = page_no;
        if page.is_empty() {
            debug!(page = page_no, "Empty page, listing exhausted");
            break;
        }

        let stop = match mode {
            SyncMode::Full => page.is_last,
            SyncMode::Delta(plan) => plan.should_stop(page_no, &page),
        };
        debug!(page = page_no, records = page.records.len(), stop, "Processed page");
        harvested.records.extend(page.records);

        if stop {
            break;
        }
        page_no += 1;
    }

    info!(
        pages = harvested.pages,
        records = harvested.records.len(),
        full = matches!(mode, SyncMode::Full),
        "Finished paging attended setlists"
    );
    Ok(harvested)
}
