//! Canonical shapes the harvester persists, independent of the upstream API's layout.
//!
//! Every optional field is an `Option` serialized as `null`, so consumers of the
//! JSON files never have to branch on a key being absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Opaque setlist identifier. Upstream sends strings, but numbers are accepted too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SetlistId(String);

impl SetlistId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File stem for the detail document.
    ///
    /// Bytes outside `[A-Za-z0-9_-]` are percent-encoded, so distinct ids never
    /// share a file and the stem cannot escape the detail directory.
    pub fn file_stem(&self) -> String {
        use std::fmt::Write as _;

        let mut stem = String::with_capacity(self.0.len());
        for byte in self.0.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                stem.push(byte as char);
            } else {
                let _ = write!(stem, "%{:02X}", byte);
            }
        }
        stem
    }

    /// Build an id from a raw JSON value; `None` for anything that is not a non-empty string or a number.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for SetlistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SetlistId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for SetlistId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        SetlistId::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid setlist id: {}", value)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtistInfo {
    pub name: Option<String>,
    pub mbid: Option<String>,
    pub tmid: Option<Value>,
    pub disambiguation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VenueInfo {
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub state_code: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub coords: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FestivalInfo {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Full per-setlist payload written to the detail file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NormalizedRecord {
    pub id: SetlistId,
    /// `DD-MM-YYYY`, as sent upstream.
    pub event_date: Option<String>,
    pub last_updated: Option<String>,
    pub artist: ArtistInfo,
    pub venue: VenueInfo,
    pub tour: Option<String>,
    pub festival: Option<FestivalInfo>,
    pub url: Option<String>,
    pub sets: Vec<Value>,
}

/// Listing projection of a [`NormalizedRecord`]; no sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexEntry {
    pub id: SetlistId,
    pub event_date: Option<String>,
    pub artist: Option<String>,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub festival: Option<String>,
    pub tour: Option<String>,
    pub url: Option<String>,
    pub last_updated: Option<String>,
}

impl From<&NormalizedRecord> for IndexEntry {
    fn from(record: &NormalizedRecord) -> Self {
        Self {
            id: record.id.clone(),
            event_date: record.event_date.clone(),
            artist: record.artist.name.clone(),
            venue: record.venue.name.clone(),
            city: record.venue.city.clone(),
            country: record.venue.country.clone(),
            country_code: record.venue.country_code.clone(),
            festival: record.festival.as_ref().and_then(|f| f.name.clone()),
            tour: record.tour.clone(),
            url: record.url.clone(),
            last_updated: record.last_updated.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexDocument {
    pub schema_version: u32,
    pub harvested_at: Option<String>,
    pub username: Option<String>,
    pub count: usize,
    pub items: Vec<IndexEntry>,
    #[serde(alias = "__integrityHash")]
    pub integrity_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailDocument {
    pub schema_version: u32,
    pub harvested_at: String,
    pub username: String,
    pub setlist: NormalizedRecord,
}

/// Sortable `YYYY-MM-DD` key from a `DD-MM-YYYY` event date. Missing parts become zeros.
pub fn event_date_key(event_date: Option<&str>) -> String {
    let mut parts = event_date.unwrap_or("").split('-');
    let pad = |s: Option<&str>, width: usize| {
        let s = s.unwrap_or("").trim();
        if s.is_empty() {
            "0".repeat(width)
        } else {
            format!("{:0>width$}", s, width = width)
        }
    };
    let day = pad(parts.next(), 2);
    let month = pad(parts.next(), 2);
    let year = pad(parts.next(), 4);
    format!("{}-{}-{}", year, month, day)
}

/// Year component of a `DD-MM-YYYY` date, if present.
pub fn event_year(event_date: Option<&str>) -> Option<&str> {
    event_date?.split('-').nth(2).filter(|y| !y.is_empty())
}

/// Newest event first; same-day records by ascending artist name.
pub fn newest_first(a: &IndexEntry, b: &IndexEntry) -> Ordering {
    let ka = event_date_key(a.event_date.as_deref());
    let kb = event_date_key(b.event_date.as_deref());
    kb.cmp(&ka).then_with(|| {
        a.artist
            .as_deref()
            .unwrap_or("")
            .cmp(b.artist.as_deref().unwrap_or(""))
    })
}

/// Stable sort, so full ties keep their incoming order.
pub fn sort_newest_first(items: &mut [IndexEntry]) {
    items.sort_by(newest_first);
}

/// Parse an upstream or harvester timestamp.
///
/// Accepts RFC 3339 and the `2013-10-20T05:18:08.000+0000` form setlist.fm emits.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"]
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

/// Whether `last_updated` is strictly after `since`.
///
/// False whenever either side is missing or unreadable. Without a prior harvest
/// stamp there is nothing to be newer than; new ids are marked by the merge.
pub fn is_after(last_updated: Option<&str>, since: Option<&str>) -> bool {
    let Some(updated) = last_updated.and_then(parse_timestamp) else {
        return false;
    };
    match since.and_then(parse_timestamp) {
        Some(since) => updated > since,
        None => false,
    }
}

/// Timestamp written into documents, e.g. `2024-05-01T12:00:00.000Z`.
pub fn harvest_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
