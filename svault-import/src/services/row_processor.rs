//! Row processor: one raw CSV row in, one outcome out
//!
//! Pure classification with no side effects. Persistence and counter
//! bookkeeping belong to the job runner, which keeps this unit independently
//! testable.

use crate::models::NewSong;
use std::collections::{HashMap, HashSet};

/// Required primary-key column in the uploaded CSV
pub const KEY_COLUMN: &str = "Track URI";

/// Outcome of processing a single row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Row is valid and its key is new; record is ready for insertion
    Inserted(Box<NewSong>),
    /// Key already present in the store or earlier in this job
    Duplicate(String),
    /// Row is unusable (missing/empty key); skipped, never retried
    Error(String),
}

/// Classify one raw row against the set of already-known keys.
///
/// `known_keys` must contain the keys present in the destination store plus
/// any keys inserted earlier in the same job.
pub fn process_row(row: &HashMap<String, String>, known_keys: &HashSet<String>) -> RowOutcome {
    let Some(track_uri) = field(row, KEY_COLUMN) else {
        return RowOutcome::Error(format!("missing {}", KEY_COLUMN));
    };

    if known_keys.contains(&track_uri) {
        return RowOutcome::Duplicate(track_uri);
    }

    let song = NewSong {
        track_name: field(row, "Track Name"),
        album_name: field(row, "Album Name"),
        artist_names: field(row, "Artist Name(s)"),
        release_date: field(row, "Release Date"),
        duration_ms: safe_int(row.get("Duration (ms)")),
        popularity: safe_int(row.get("Popularity")),
        explicit: safe_bool(row.get("Explicit")),
        added_by: field(row, "Added By"),
        added_at: field(row, "Added At"),
        genres: field(row, "Genres"),
        record_label: field(row, "Record Label"),
        danceability: safe_float(row.get("Danceability")),
        energy: safe_float(row.get("Energy")),
        key: safe_int(row.get("Key")),
        loudness: safe_float(row.get("Loudness")),
        mode: safe_int(row.get("Mode")),
        speechiness: safe_float(row.get("Speechiness")),
        acousticness: safe_float(row.get("Acousticness")),
        instrumentalness: safe_float(row.get("Instrumentalness")),
        liveness: safe_float(row.get("Liveness")),
        valence: safe_float(row.get("Valence")),
        tempo: safe_float(row.get("Tempo")),
        time_signature: safe_int(row.get("Time Signature")),
        track_uri,
    };

    RowOutcome::Inserted(Box::new(song))
}

/// Trimmed, non-empty string field; empty cells become `None`
fn field(row: &HashMap<String, String>, name: &str) -> Option<String> {
    row.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Permissive integer parse; accepts float spellings like "123.0".
/// Malformed values resolve to `None` instead of failing the row.
fn safe_int(value: Option<&String>) -> Option<i64> {
    let v = value?.trim();
    if v.is_empty() {
        return None;
    }
    v.parse::<f64>().ok().map(|f| f as i64)
}

/// Permissive float parse
fn safe_float(value: Option<&String>) -> Option<f64> {
    let v = value?.trim();
    if v.is_empty() {
        return None;
    }
    v.parse::<f64>().ok()
}

/// Permissive boolean parse; unknown spellings default to false
fn safe_bool(value: Option<&String>) -> bool {
    match value {
        Some(v) => matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "t"),
        None => false,
    }
}
