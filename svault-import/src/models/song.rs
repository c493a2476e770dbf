//! Normalized song record produced by the row processor

use serde::{Deserialize, Serialize};

/// One validated track, keyed by its externally supplied URI.
///
/// Everything except the key is optional; the CSV export format varies and
/// malformed optional fields degrade to `None` rather than failing the row.
/// Release date and added-at stay as strings because exports are not
/// consistent about their format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSong {
    pub track_uri: String,
    pub track_name: Option<String>,
    pub album_name: Option<String>,
    pub artist_names: Option<String>,
    pub release_date: Option<String>,
    pub duration_ms: Option<i64>,
    pub popularity: Option<i64>,
    pub explicit: bool,
    pub added_by: Option<String>,
    pub added_at: Option<String>,
    pub genres: Option<String>,
    pub record_label: Option<String>,
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub key: Option<i64>,
    pub loudness: Option<f64>,
    pub mode: Option<i64>,
    pub speechiness: Option<f64>,
    pub acousticness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub liveness: Option<f64>,
    pub valence: Option<f64>,
    pub tempo: Option<f64>,
    pub time_signature: Option<i64>,
}
