use crate::domain::{ArtistInfo, FestivalInfo, NormalizedRecord, SetlistId, VenueInfo};
use serde_json::Value;

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn opaque(value: &Value) -> Option<Value> {
    if value.is_null() {
        None
    } else {
        Some(value.clone())
    }
}

/// Map one raw attended-listing record onto [`NormalizedRecord`].
///
/// Missing substructures at any depth become `None`. Returns `None` only when the
/// record carries no usable `id`.
pub fn normalize(raw: &Value) -> Option<NormalizedRecord> {
    let id = SetlistId::from_json(&raw["id"])?;

    let artist = &raw["artist"];
    let venue = &raw["venue"];
    let city = &venue["city"];

    let festival_raw = if raw["event"]["festival"].is_object() {
        &raw["event"]["festival"]
    } else {
        &raw["festival"]
    };
    let festival = festival_raw.is_object().then(|| FestivalInfo {
        id: text(&festival_raw["id"]),
        name: text(&festival_raw["name"]),
    });

    let sets = match &raw["sets"]["set"] {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        single => vec![single.clone()],
    };

    Some(NormalizedRecord {
        id,
        event_date: text(&raw["eventDate"]),
        last_updated: text(&raw["lastUpdated"]),
        artist: ArtistInfo {
            name: text(&artist["name"]),
            mbid: text(&artist["mbid"]),
            tmid: opaque(&artist["tmid"]),
            disambiguation: text(&artist["disambiguation"]),
        },
        venue: VenueInfo {
            name: text(&venue["name"]),
            city: text(&city["name"]),
            state: text(&city["state"]),
            state_code: text(&city["stateCode"]),
            country: text(&city["country"]["name"]),
            country_code: text(&city["country"]["code"]),
            coords: opaque(&city["coords"]),
        },
        tour: text(&raw["tour"]["name"]),
        festival,
        url: text(&raw["url"]),
        sets,
    })
}
