use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use setlist_harvester::app::ports::{AttendedPage, AttendedSource};
use setlist_harvester::config::{HarvestConfig, OutputPaths};
use setlist_harvester::domain::{IndexDocument, NormalizedRecord};
use setlist_harvester::error::HarvestError;
use setlist_harvester::pipeline::normalize::normalize;
use setlist_harvester::pipeline::{rebuild_views, Harvester};
use setlist_harvester::storage::HarvestStore;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Serves raw API records through the real normalizer; pages past the end are empty.
struct StaticListing {
    pages: Vec<Vec<NormalizedRecord>>,
}

impl StaticListing {
    fn new(pages: Vec<Vec<Value>>) -> Self {
        let pages = pages
            .iter()
            .map(|page| page.iter().filter_map(normalize).collect())
            .collect();
        Self { pages }
    }
}

#[async_trait]
impl AttendedSource for StaticListing {
    async fn fetch_page(&self, _username: &str, page: u32) -> setlist_harvester::error::Result<AttendedPage> {
        let records = self.pages.get(page as usize - 1).cloned().unwrap_or_default();
        Ok(AttendedPage::from_records(records))
    }
}

fn raw(id: &str, date: &str, artist: &str, last_updated: Option<&str>) -> Value {
    json!({
        "id": id,
        "eventDate": date,
        "lastUpdated": last_updated,
        "artist": {"name": artist},
        "venue": {"name": "Paradiso", "city": {"name": "Amsterdam", "country": {"code": "NL", "name": "Netherlands"}}},
        "sets": {"set": [{"song": [{"name": "Opener"}]}]}
    })
}

fn config(out: &Path, full_rescan: bool) -> HarvestConfig {
    HarvestConfig {
        api_key: "test-key".into(),
        username: "someone".into(),
        locale: "en".into(),
        api_base: "http://localhost".into(),
        full_rescan,
        refresh_pages: 3,
        include_festival: true,
        max_rate_limit_retries: None,
        output: OutputPaths::in_dir(out),
    }
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

async fn harvest(
    out: &Path,
    full_rescan: bool,
    pages: Vec<Vec<Value>>,
    now: DateTime<Utc>,
) -> Result<setlist_harvester::pipeline::HarvestReport> {
    let cfg = config(out, full_rescan);
    let harvester = Harvester::new(StaticListing::new(pages), HarvestStore::new(cfg.output.clone()), &cfg);
    Ok(harvester.run_at(now).await?)
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn first_harvest_writes_everything_newest_first() -> Result<()> {
    let dir = tempdir()?;
    let paths = OutputPaths::in_dir(dir.path());

    let report = harvest(
        dir.path(),
        false,
        vec![vec![raw("1", "01-05-2024", "Alpha", None), raw("2", "02-05-2024", "Beta", None)]],
        at(2024, 6, 1),
    )
    .await?;

    assert_eq!(report.details_written, 2);
    assert!(report.index_written);
    assert!(report.views_written);

    let index: IndexDocument = serde_json::from_value(read_json(&paths.index))?;
    let ids: Vec<&str> = index.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "1"]);
    assert_eq!(index.count, 2);
    assert_eq!(index.username.as_deref(), Some("someone"));
    assert_eq!(index.harvested_at.as_deref(), Some("2024-06-01T12:00:00.000Z"));

    let detail = read_json(&paths.detail_dir.join("1.json"));
    assert_eq!(detail["setlist"]["artist"]["name"], "Alpha");
    assert_eq!(detail["setlist"]["venue"]["countryCode"], "NL");
    assert_eq!(detail["setlist"]["sets"][0]["song"][0]["name"], "Opener");
    assert!(paths.detail_dir.join("2.json").exists());

    let rollup = read_json(&paths.rollup);
    assert_eq!(rollup["summary"]["total"], 2);
    assert_eq!(rollup["summary"]["uniqueArtists"], 2);
    assert_eq!(rollup["summary"]["byCountry"]["NL"], 2);

    let views = read_json(&paths.views);
    assert_eq!(views["byYear"]["2024"], json!(["2", "1"]));
    assert_eq!(views["byVenue"]["Paradiso, Amsterdam, NL"], json!(["2", "1"]));
    assert_eq!(views["labels"]["country"]["NL"], "Netherlands");
    Ok(())
}

#[tokio::test]
async fn second_identical_harvest_writes_nothing_but_rollup() -> Result<()> {
    let dir = tempdir()?;
    let paths = OutputPaths::in_dir(dir.path());
    let pages = || vec![vec![raw("1", "01-05-2024", "Alpha", None), raw("2", "02-05-2024", "Beta", None)]];

    harvest(dir.path(), false, pages(), at(2024, 6, 1)).await?;
    let index_before = fs::read(&paths.index)?;
    let views_before = fs::read(&paths.views)?;
    let detail_before = fs::read(paths.detail_dir.join("1.json"))?;

    let report = harvest(dir.path(), false, pages(), at(2024, 6, 2)).await?;

    assert_eq!(report.details_written, 0);
    assert!(!report.index_written);
    assert!(!report.views_written);
    assert_eq!(fs::read(&paths.index)?, index_before);
    assert_eq!(fs::read(&paths.views)?, views_before);
    assert_eq!(fs::read(paths.detail_dir.join("1.json"))?, detail_before);

    let rollup = read_json(&paths.rollup);
    assert_eq!(rollup["harvestedAt"], "2024-06-02T12:00:00.000Z");
    Ok(())
}

#[tokio::test]
async fn newer_last_updated_rewrites_detail_without_touching_index() -> Result<()> {
    let dir = tempdir()?;
    let paths = OutputPaths::in_dir(dir.path());
    let edited = Some("2024-01-01T00:00:00Z");
    let pages = || vec![vec![raw("1", "01-05-2023", "Alpha", edited)]];

    // The first harvest is stamped before the upstream edit
    harvest(dir.path(), false, pages(), at(2023, 12, 1)).await?;
    let index_before = fs::read(&paths.index)?;

    let report = harvest(dir.path(), false, pages(), at(2024, 2, 1)).await?;

    assert_eq!(report.details_written, 1);
    assert!(!report.index_written);
    assert_eq!(fs::read(&paths.index)?, index_before);
    let detail = read_json(&paths.detail_dir.join("1.json"));
    assert_eq!(detail["harvestedAt"], "2024-02-01T12:00:00.000Z");
    Ok(())
}

#[tokio::test]
async fn delta_run_merges_new_records_and_keeps_old_ones() -> Result<()> {
    let dir = tempdir()?;
    let paths = OutputPaths::in_dir(dir.path());

    harvest(dir.path(), false, vec![vec![raw("1", "01-05-2023", "Alpha", None)]], at(2023, 6, 1)).await?;
    let report = harvest(
        dir.path(),
        false,
        vec![vec![raw("2", "01-05-2024", "Beta", None)]],
        at(2024, 6, 1),
    )
    .await?;

    assert_eq!(report.details_written, 1);
    assert!(report.index_written);
    let index: IndexDocument = serde_json::from_value(read_json(&paths.index))?;
    let ids: Vec<&str> = index.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "1"]);
    Ok(())
}

#[tokio::test]
async fn full_rescan_refreshes_known_details_and_skips_missing_ones() -> Result<()> {
    let dir = tempdir()?;
    let paths = OutputPaths::in_dir(dir.path());

    harvest(
        dir.path(),
        false,
        vec![vec![raw("gone", "01-01-2020", "Old", None), raw("lost", "02-01-2020", "Older", None)]],
        at(2023, 6, 1),
    )
    .await?;
    fs::remove_file(paths.detail_dir.join("lost.json"))?;

    let report = harvest(
        dir.path(),
        true,
        vec![vec![raw("1", "01-05-2024", "Alpha", None), raw("1", "01-05-2024", "Alpha", None)]],
        at(2024, 6, 1),
    )
    .await?;

    assert!(report.full_rescan);
    assert_eq!(report.details_written, 1);
    assert_eq!(report.details_refreshed, 1);
    assert_eq!(report.details_skipped, 1);

    let index: IndexDocument = serde_json::from_value(read_json(&paths.index))?;
    let ids: Vec<&str> = index.items.iter().map(|i| i.id.as_str()).collect();
    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len());
    assert_eq!(unique, HashSet::from(["1", "gone", "lost"]));

    let gone = read_json(&paths.detail_dir.join("gone.json"));
    assert_eq!(gone["harvestedAt"], "2024-06-01T12:00:00.000Z");
    assert_eq!(gone["setlist"]["artist"]["name"], "Old");
    assert!(!paths.detail_dir.join("lost.json").exists());
    Ok(())
}

#[tokio::test]
async fn corrupt_index_is_a_cold_start() -> Result<()> {
    let dir = tempdir()?;
    let paths = OutputPaths::in_dir(dir.path());
    fs::create_dir_all(&paths.dir)?;
    fs::write(&paths.index, "{\"items\": [")?;

    let report = harvest(dir.path(), false, vec![vec![raw("1", "01-05-2024", "Alpha", None)]], at(2024, 6, 1)).await?;

    assert!(report.index_written);
    assert_eq!(report.details_written, 1);
    let index: IndexDocument = serde_json::from_value(read_json(&paths.index))?;
    assert_eq!(index.items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn views_rebuild_needs_an_index() -> Result<()> {
    let dir = tempdir()?;
    let store = HarvestStore::new(OutputPaths::in_dir(dir.path()));
    let err = rebuild_views(&store, "someone", at(2024, 6, 1)).unwrap_err();
    assert!(matches!(err, HarvestError::MissingIndex(_)));

    harvest(dir.path(), false, vec![vec![raw("1", "01-05-2024", "Alpha", None)]], at(2024, 6, 1)).await?;
    fs::remove_file(&store.paths().views)?;
    assert!(rebuild_views(&store, "someone", at(2024, 6, 2))?);
    assert!(!rebuild_views(&store, "someone", at(2024, 6, 3))?);
    let views = read_json(&store.paths().views);
    assert_eq!(views["byArtist"]["Alpha"], json!(["1"]));
    Ok(())
}
