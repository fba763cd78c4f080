//! Model module - player state and Spotify API access
//!
//! Organized into submodules by responsibility:
//!
//! - `snapshot`: parsing raw poll payloads into normalized snapshots
//! - `reconcile`: applying snapshots to the displayed state
//! - `player`: the displayed player screen state
//! - `spotify_client`: raw Spotify Web API client

mod player;
mod reconcile;
mod snapshot;
mod spotify_client;

pub use player::{format_time, PlayerScreenState, ScreenMessage};

pub use reconcile::reconcile;

pub use snapshot::{
    parse_api_error, parse_like_status, ArtistImageUpdate, LikeStatus, SnapshotExtractor,
};

pub use spotify_client::{FetchError, PlayerStateSource, SpotifyClient};
