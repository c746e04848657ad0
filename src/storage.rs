//! JSON file store for the index, detail, views and rollup documents.
//!
//! Reads are forgiving: a missing or unreadable file is treated as absent. Writes
//! go through a temp file in the target directory and are renamed into place, so
//! a crash never leaves a half-written document behind.

use crate::config::OutputPaths;
use crate::constants::SCHEMA_VERSION;
use crate::domain::{DetailDocument, IndexDocument, SetlistId};
use crate::error::{HarvestError, Result};
use crate::pipeline::rollup::RollupDocument;
use crate::pipeline::views::ViewsDocument;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Deserialize `path`, or `None` if it is missing or not valid for `T`.
pub fn read_json_safe<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No previous document");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable document, treating as absent");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt document, treating as absent");
            None
        }
    }
}

/// Pretty-print `value` to `path` atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| HarvestError::Persist {
        path: path.display().to_string(),
        source: e.error,
    })?;
    Ok(())
}

/// Only the integrity hash of a stored document; the rest is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredHash {
    #[serde(default, alias = "__integrityHash")]
    integrity_hash: Option<String>,
}

pub struct HarvestStore {
    paths: OutputPaths,
}

impl HarvestStore {
    pub fn new(paths: OutputPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.paths.dir)?;
        fs::create_dir_all(&self.paths.detail_dir)?;
        Ok(())
    }

    pub fn load_index(&self) -> Option<IndexDocument> {
        read_json_safe(&self.paths.index)
    }

    pub fn write_index(&self, doc: &IndexDocument) -> Result<()> {
        write_json_atomic(&self.paths.index, doc)
    }

    pub fn detail_path(&self, id: &SetlistId) -> PathBuf {
        self.paths.detail_dir.join(format!("{}.json", id.file_stem()))
    }

    pub fn write_detail(&self, doc: &DetailDocument) -> Result<()> {
        write_json_atomic(&self.detail_path(&doc.setlist.id), doc)
    }

    /// Re-stamp a stored detail document without touching its setlist payload.
    ///
    /// Returns `false` when there is no usable stored detail to refresh.
    pub fn refresh_detail(&self, id: &SetlistId, harvested_at: &str) -> Result<bool> {
        let path = self.detail_path(id);
        let Some(mut doc) = read_json_safe::<Value>(&path) else {
            return Ok(false);
        };
        let has_setlist = doc.get("setlist").is_some_and(|s| !s.is_null());
        let Some(obj) = doc.as_object_mut().filter(|_| has_setlist) else {
            return Ok(false);
        };
        obj.insert("schemaVersion".into(), Value::from(SCHEMA_VERSION));
        obj.insert("harvestedAt".into(), Value::from(harvested_at));
        write_json_atomic(&path, &doc)?;
        Ok(true)
    }

    pub fn stored_views_hash(&self) -> Option<String> {
        read_json_safe::<StoredHash>(&self.paths.views).and_then(|h| h.integrity_hash)
    }

    pub fn write_views(&self, doc: &ViewsDocument) -> Result<()> {
        write_json_atomic(&self.paths.views, doc)
    }

    pub fn write_rollup(&self, doc: &RollupDocument) -> Result<()> {
        write_json_atomic(&self.paths.rollup, doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NormalizedRecord;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, HarvestStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HarvestStore::new(OutputPaths::in_dir(dir.path()));
        store.ensure_dirs().unwrap();
        (dir, store)
    }

    #[test]
    fn missing_and_corrupt_index_read_as_absent() {
        let (_dir, store) = store();
        assert!(store.load_index().is_none());
        fs::write(&store.paths().index, "{ not json").unwrap();
        assert!(store.load_index().is_none());
    }

    #[test]
    fn index_round_trips_through_disk() {
        let (_dir, store) = store();
        let doc = IndexDocument {
            schema_version: 1,
            harvested_at: Some("2024-01-01T00:00:00.000Z".into()),
            username: Some("me".into()),
            count: 0,
            items: vec![],
            integrity_hash: Some("abc".into()),
        };
        store.write_index(&doc).unwrap();
        assert_eq!(store.load_index(), Some(doc));
    }

    #[test]
    fn refresh_detail_keeps_payload_and_restamps() {
        let (_dir, store) = store();
        let id = SetlistId::from("1");
        assert!(!store.refresh_detail(&id, "later").unwrap());

        let path = store.detail_path(&id);
        write_json_atomic(
            &path,
            &json!({"schemaVersion": 0, "harvestedAt": "old", "username": "me", "setlist": {"id": "1", "tour": "T"}}),
        )
        .unwrap();
        assert!(store.refresh_detail(&id, "later").unwrap());
        let doc: Value = read_json_safe(&path).unwrap();
        assert_eq!(doc["harvestedAt"], "later");
        assert_eq!(doc["schemaVersion"], 1);
        assert_eq!(doc["username"], "me");
        assert_eq!(doc["setlist"]["tour"], "T");
    }

    #[test]
    fn detail_without_setlist_is_not_refreshed() {
        let (_dir, store) = store();
        let id = SetlistId::from("2");
        write_json_atomic(&store.detail_path(&id), &json!({"harvestedAt": "old"})).unwrap();
        assert!(!store.refresh_detail(&id, "later").unwrap());
    }

    #[test]
    fn detail_files_are_named_by_id() {
        let (dir, store) = store();
        let doc = DetailDocument {
            schema_version: 1,
            harvested_at: "now".into(),
            username: "me".into(),
            setlist: NormalizedRecord { id: "abc123".into(), ..Default::default() },
        };
        store.write_detail(&doc).unwrap();
        assert!(dir.path().join(crate::constants::DETAIL_DIR).join("abc123.json").exists());
        let stored: Option<DetailDocument> = read_json_safe(&store.detail_path(&"abc123".into()));
        assert_eq!(stored, Some(doc));
    }

    #[test]
    fn lookalike_ids_get_separate_detail_files() {
        let (_dir, store) = store();
        for (id, tour) in [("a/b", "slash"), ("a_b", "underscore")] {
            store
                .write_detail(&DetailDocument {
                    schema_version: 1,
                    harvested_at: "now".into(),
                    username: "me".into(),
                    setlist: NormalizedRecord { id: id.into(), tour: Some(tour.into()), ..Default::default() },
                })
                .unwrap();
        }
        let slash: DetailDocument = read_json_safe(&store.detail_path(&"a/b".into())).unwrap();
        let underscore: DetailDocument = read_json_safe(&store.detail_path(&"a_b".into())).unwrap();
        assert_eq!(slash.setlist.tour.as_deref(), Some("slash"));
        assert_eq!(underscore.setlist.tour.as_deref(), Some("underscore"));
    }

    #[test]
    fn views_hash_accepts_legacy_key() {
        let (_dir, store) = store();
        assert_eq!(store.stored_views_hash(), None);
        fs::write(&store.paths().views, r#"{"byYear": {}, "__integrityHash": "h1"}"#).unwrap();
        assert_eq!(store.stored_views_hash().as_deref(), Some("h1"));
    }
}
