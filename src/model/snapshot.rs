//! Parsing of raw player-state payloads into normalized snapshots
//!
//! The player endpoint returns an empty body when nothing is active and a
//! partial object for restricted clients, so every field here is extracted
//! with an explicit default instead of a typed deserialize.

use serde_json::Value;

/// One artist credit on a track: display name and API lookup URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtistRef {
    pub name: String,
    pub href: String,
}

/// Normalized result of one player-state poll.
///
/// An empty `track_id` is the sentinel for "no usable item in the payload".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackSnapshot {
    pub track_id: String,
    pub title: String,
    pub artists: Vec<ArtistRef>,
    pub duration_ms: u64,
    pub progress_ms: u64,
    pub image_url: Option<String>,
    pub is_playing: bool,
    pub is_shuffle: bool,
    pub is_smart_shuffle: bool,
    pub is_shuffle_allowed: bool,
    pub volume_percent: Option<u8>,
    pub supports_volume: Option<bool>,
    pub device_name: Option<String>,
    pub is_same_track: bool,
    pub is_same_image: bool,
}

impl TrackSnapshot {
    pub fn is_empty(&self) -> bool {
        self.track_id.is_empty()
    }

    /// Comma-joined artist names for the single-line display.
    pub fn artist_line(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Outcome of parsing a like-status response body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LikeStatus {
    Liked(bool),
    /// "Too many requests" payload, usually from several clients sharing one
    /// client ID.
    RateLimited,
    /// Structured `{"error": {"message": ...}}` body.
    ApiError(String),
    /// JSON object without the error shape.
    Malformed,
    /// Not JSON at all. Nothing to report.
    Unparseable,
}

/// Outcome of parsing an artist lookup response body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtistImageUpdate {
    /// New image URL to display, `None` when the artist has no images.
    Apply(Option<String>),
    /// Same URL as last time, keep the current display.
    Unchanged,
    ApiError(String),
    /// Empty or non-object body.
    Ignored,
}

/// Stateful extractor for the poll loop.
///
/// Keeps the previously seen track id and image URLs so each snapshot can
/// carry same-track / same-image flags, which is what lets the reconciler
/// skip redundant UI refreshes.
#[derive(Debug)]
pub struct SnapshotExtractor {
    previous_track_id: String,
    previous_image_url: String,
    previous_artist_image_url: String,
    first_artist_lookup: bool,
}

impl Default for SnapshotExtractor {
    fn default() -> Self {
        Self {
            previous_track_id: String::new(),
            previous_image_url: String::new(),
            previous_artist_image_url: String::new(),
            first_artist_lookup: true,
        }
    }
}

impl SnapshotExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the body holds a player object with a usable `item`.
    /// Everything else (empty body, non-object, item null) means no track.
    pub fn has_active_item(body: &str) -> bool {
        if !body.starts_with('{') {
            return false;
        }
        match serde_json::from_str::<Value>(body) {
            Ok(root) => root.get("item").map(Value::is_object).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Parse one player-state body into a snapshot, updating the previous
    /// track/image memory as a side effect. A body without a usable `item`
    /// yields the empty sentinel and leaves the memory untouched.
    pub fn extract(&mut self, body: &str) -> TrackSnapshot {
        let root: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(_) => return TrackSnapshot::default(),
        };
        let item = match root.get("item").filter(|v| v.is_object()) {
            Some(item) => item,
            None => return TrackSnapshot::default(),
        };

        let is_playing = opt_bool(&root, "is_playing");
        let is_shuffle = opt_bool(&root, "shuffle_state");
        let is_smart_shuffle = opt_bool(&root, "smart_shuffle");

        let device = root.get("device");
        let volume_percent = device
            .and_then(|d| d.get("volume_percent"))
            .and_then(Value::as_u64)
            .map(|v| v.min(100) as u8);
        let supports_volume = device
            .and_then(|d| d.get("supports_volume"))
            .and_then(Value::as_bool);
        let device_name = device
            .and_then(|d| d.get("name"))
            .and_then(Value::as_str)
            .map(str::to_owned);

        // The API reports the disallowed action; absence of the field is
        // treated as shuffle not being available.
        let is_shuffle_allowed = root
            .get("actions")
            .and_then(|a| a.get("disallows"))
            .and_then(|d| d.get("toggling_shuffle"))
            .and_then(Value::as_bool)
            .map(|disallowed| !disallowed)
            .unwrap_or(false);

        let track_id = opt_string(item, "id");
        let is_same_track = if track_id != self.previous_track_id {
            self.previous_track_id = track_id.clone();
            false
        } else {
            true
        };

        let artists = item
            .get("artists")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .map(|a| ArtistRef {
                        name: opt_string(a, "name"),
                        href: opt_string(a, "href"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let title = opt_string(item, "name");
        let duration_ms = opt_u64(item, "duration_ms");
        let progress_ms = opt_u64(&root, "progress_ms");

        let image_url = item
            .get("album")
            .and_then(|a| a.get("images"))
            .and_then(Value::as_array)
            .and_then(|imgs| imgs.first())
            .map(|img| opt_string(img, "url"));
        let is_same_image = match &image_url {
            Some(url) if *url == self.previous_image_url => true,
            Some(url) => {
                self.previous_image_url = url.clone();
                false
            }
            None => false,
        };

        TrackSnapshot {
            track_id,
            title,
            artists,
            duration_ms,
            progress_ms,
            image_url,
            is_playing,
            is_shuffle,
            is_smart_shuffle,
            is_shuffle_allowed,
            volume_percent,
            supports_volume,
            device_name,
            is_same_track,
            is_same_image,
        }
    }

    /// Parse an artist lookup body, diffing against the previously applied
    /// artist image so an unchanged image is not re-applied. The very first
    /// lookup always applies, even if the URL matches stale memory.
    pub fn extract_artist_image(&mut self, body: &str) -> ArtistImageUpdate {
        if !body.starts_with('{') {
            return ArtistImageUpdate::Ignored;
        }
        let root: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(_) => return ArtistImageUpdate::Ignored,
        };
        if let Some(err) = root.get("error").filter(|v| v.is_object()) {
            return ArtistImageUpdate::ApiError(opt_string(err, "message"));
        }

        let image_url = root
            .get("images")
            .and_then(Value::as_array)
            .and_then(|imgs| imgs.first())
            .map(|img| opt_string(img, "url"));

        let same = match &image_url {
            Some(url) if *url == self.previous_artist_image_url => true,
            Some(url) => {
                self.previous_artist_image_url = url.clone();
                false
            }
            None => false,
        };

        if same && !self.first_artist_lookup {
            ArtistImageUpdate::Unchanged
        } else {
            self.first_artist_lookup = false;
            ArtistImageUpdate::Apply(image_url)
        }
    }
}

/// Parse a like-status body. The happy path is a JSON array of booleans; a
/// handful of error shapes come back as objects or plain text instead.
pub fn parse_like_status(body: &str) -> LikeStatus {
    if body.is_empty() {
        return LikeStatus::Unparseable;
    }
    if let Ok(Value::Array(arr)) = serde_json::from_str::<Value>(body) {
        if let Some(liked) = arr.first().and_then(Value::as_bool) {
            return LikeStatus::Liked(liked);
        }
    }
    if body.contains("Too many requests") {
        return LikeStatus::RateLimited;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(root) if root.is_object() => match root.get("error").filter(|v| v.is_object()) {
            Some(err) => LikeStatus::ApiError(opt_string(err, "message")),
            None => LikeStatus::Malformed,
        },
        _ => LikeStatus::Unparseable,
    }
}

/// Structured `{"error": {"status": .., "message": ..}}` body the API
/// returns in place of a player state when it rejects the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiErrorBody {
    pub status: i64,
    pub message: String,
}

impl ApiErrorBody {
    /// The stored access token was rejected server side.
    pub fn is_auth_failure(&self) -> bool {
        self.status == 401
    }
}

/// Detect the rejected-request shape in a player-state body. A rejected
/// poll must never read as "nothing playing".
pub fn parse_api_error(body: &str) -> Option<ApiErrorBody> {
    if !body.starts_with('{') {
        return None;
    }
    let root: Value = serde_json::from_str(body).ok()?;
    let err = root.get("error").filter(|v| v.is_object())?;
    Some(ApiErrorBody {
        status: err.get("status").and_then(Value::as_i64).unwrap_or(0),
        message: opt_string(err, "message"),
    })
}

fn opt_string(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn opt_u64(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn opt_bool(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}
