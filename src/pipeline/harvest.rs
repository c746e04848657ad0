use crate::app::ports::AttendedSource;
use crate::config::HarvestConfig;
use crate::constants::SCHEMA_VERSION;
use crate::domain::{harvest_timestamp, DetailDocument, IndexDocument, IndexEntry, NormalizedRecord, SetlistId};
use crate::error::{HarvestError, Result};
use crate::integrity::integrity_hash;
use crate::observability::metrics;
use crate::pipeline::merge::merge_index;
use crate::pipeline::planner::{collect_pages, DeltaPlan, SyncMode};
use crate::pipeline::rollup::build_rollup;
use crate::pipeline::views::{build_views, ViewsDocument};
use crate::storage::HarvestStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// Outcome of one harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub full_rescan: bool,
    pub pages_fetched: u32,
    pub records_harvested: usize,
    pub index_items: usize,
    pub details_written: usize,
    pub details_refreshed: usize,
    pub details_skipped: usize,
    pub index_written: bool,
    pub views_written: bool,
}

/// Hashed portion of the index document.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexHashInput<'a> {
    schema_version: u32,
    items: &'a [IndexEntry],
}

pub fn index_hash(items: &[IndexEntry]) -> Result<String> {
    integrity_hash(&IndexHashInput { schema_version: SCHEMA_VERSION, items })
}

/// Recompute views from `items`; writes only when the views hash changed.
pub fn publish_views(store: &HarvestStore, items: &[IndexEntry], harvested_at: &str) -> Result<bool> {
    let views = build_views(items);
    let next_hash = integrity_hash(&views)?;
    if store.stored_views_hash().as_deref() == Some(next_hash.as_str()) {
        info!("No changes in views");
        return Ok(false);
    }
    store.write_views(&ViewsDocument {
        harvested_at: harvested_at.to_string(),
        views,
        integrity_hash: next_hash,
    })?;
    metrics::store::views_written();
    info!(path = %store.paths().views.display(), "Wrote views");
    Ok(true)
}

/// Always rewrites the rollup.
pub fn publish_rollup(store: &HarvestStore, items: &[IndexEntry], username: &str, harvested_at: &str) -> Result<()> {
    let rollup = build_rollup(items, username, harvested_at);
    store.write_rollup(&rollup)?;
    info!(
        total = rollup.summary.total,
        unique_artists = rollup.summary.unique_artists,
        "Wrote rollup"
    );
    Ok(())
}

/// Rebuild views and rollup from the stored index, without touching the network.
pub fn rebuild_views(store: &HarvestStore, username: &str, now: DateTime<Utc>) -> Result<bool> {
    let index = store
        .load_index()
        .ok_or_else(|| HarvestError::MissingIndex(store.paths().index.display().to_string()))?;
    let harvested_at = harvest_timestamp(now);
    let username = index.username.as_deref().unwrap_or(username);
    let changed = publish_views(store, &index.items, &harvested_at)?;
    publish_rollup(store, &index.items, username, &harvested_at)?;
    Ok(changed)
}

/// Runs one harvest: page the remote listing, merge into the index, then derive views and rollup.
pub struct Harvester<S> {
    source: S,
    store: HarvestStore,
    username: String,
    full_rescan: bool,
    refresh_pages: u32,
}

impl<S: AttendedSource> Harvester<S> {
    pub fn new(source: S, store: HarvestStore, config: &HarvestConfig) -> Self {
        Self {
            source,
            store,
            username: config.username.clone(),
            full_rescan: config.full_rescan,
            refresh_pages: config.refresh_pages,
        }
    }

    pub fn store(&self) -> &HarvestStore {
        &self.store
    }

    pub async fn run(&self) -> Result<HarvestReport> {
        self.run_at(Utc::now()).await
    }

    /// Harvest with an explicit clock, stamped into every document written.
    #[instrument(skip(self), fields(username = %self.username, full_rescan = self.full_rescan))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<HarvestReport> {
        self.store.ensure_dirs()?;

        let previous = self.store.load_index();
        let previous_items: &[IndexEntry] = previous.as_ref().map(|d| d.items.as_slice()).unwrap_or(&[]);
        let last_harvest = previous.as_ref().and_then(|d| d.harvested_at.clone());
        let previous_hash = previous.as_ref().and_then(|d| d.integrity_hash.clone());

        let mode = if self.full_rescan {
            SyncMode::Full
        } else {
            SyncMode::Delta(DeltaPlan {
                known_ids: previous_items.iter().map(|i| i.id.clone()).collect(),
                refresh_pages: self.refresh_pages,
                last_harvest: last_harvest.clone(),
            })
        };
        let harvested = collect_pages(&self.source, &self.username, &mode).await?;
        metrics::store::records_harvested(harvested.records.len());

        let outcome = merge_index(
            previous_items,
            &harvested.records,
            last_harvest.as_deref(),
            self.full_rescan,
        );
        let harvested_at = harvest_timestamp(now);

        let mut report = HarvestReport {
            full_rescan: self.full_rescan,
            pages_fetched: harvested.pages,
            records_harvested: harvested.records.len(),
            index_items: outcome.items.len(),
            ..Default::default()
        };

        // Later duplicates win, matching the index upsert
        let fetched: HashMap<&SetlistId, &NormalizedRecord> =
            harvested.records.iter().map(|r| (&r.id, r)).collect();
        for id in &outcome.detail_writes {
            match fetched.get(id) {
                Some(record) => {
                    self.store.write_detail(&DetailDocument {
                        schema_version: SCHEMA_VERSION,
                        harvested_at: harvested_at.clone(),
                        username: self.username.clone(),
                        setlist: (*record).clone(),
                    })?;
                    metrics::store::detail_written();
                    report.details_written += 1;
                }
                None => {
                    if self.store.refresh_detail(id, &harvested_at)? {
                        report.details_refreshed += 1;
                    } else {
                        warn!(id = %id, "Skipped detail: not in fetched pages and no stored detail");
                        metrics::store::detail_skipped();
                        report.details_skipped += 1;
                    }
                }
            }
        }

        let next_hash = index_hash(&outcome.items)?;
        if previous_hash.as_deref() != Some(next_hash.as_str()) {
            self.store.write_index(&IndexDocument {
                schema_version: SCHEMA_VERSION,
                harvested_at: Some(harvested_at.clone()),
                username: Some(self.username.clone()),
                count: outcome.items.len(),
                items: outcome.items.clone(),
                integrity_hash: Some(next_hash),
            })?;
            metrics::store::index_written();
            report.index_written = true;
            info!(
                items = outcome.items.len(),
                details = report.details_written + report.details_refreshed,
                "Wrote index"
            );
        } else {
            info!(
                details = report.details_written + report.details_refreshed,
                "No index changes"
            );
        }

        report.views_written = publish_views(&self.store, &outcome.items, &harvested_at)?;
        publish_rollup(&self.store, &outcome.items, &self.username, &harvested_at)?;

        info!(?report, "Harvest complete");
        Ok(report)
    }
}
