//! The document tree the codec reads and writes. Rust's trait objects
//! carry no runtime type tag, so callers build this tree explicitly
//! alongside the live graph rather than have the codec introspect a bare
//! `Arc<dyn Producer>`.

use std::path::PathBuf;
use std::sync::Arc;

use mlt_core::{Profile, TimeFormat};
use mlt_compose::{Playlist, Tractor};
use mlt_service::Producer;

/// A node a tractor's multitrack can hold: either a plain producer or a
/// playlist (the only two kinds seed test 5 exercises, and the common
/// real-world case — a playlist-of-playlists is out of scope here).
#[derive(Clone)]
pub enum TrackNode {
    Producer(Arc<dyn Producer>),
    Playlist(Arc<Playlist>),
}

/// The document's root element.
#[derive(Clone)]
pub enum RootNode {
    Producer(Arc<dyn Producer>),
    Playlist(Arc<Playlist>),
    Tractor(Arc<Tractor>, Vec<TrackNode>),
}

/// A full `<mlt>` document.
#[derive(Clone)]
pub struct Document {
    pub profile: Profile,
    pub lc_numeric: String,
    pub root_dir: Option<PathBuf>,
    pub time_format: TimeFormat,
    pub title: Option<String>,
    pub root: RootNode,
}

impl Document {
    pub fn new(profile: Profile, root: RootNode) -> Self {
        Self {
            profile,
            lc_numeric: "C".to_string(),
            root_dir: None,
            time_format: TimeFormat::Frames,
            title: None,
            root,
        }
    }
}
