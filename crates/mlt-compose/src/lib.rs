//! Compositing producers built on top of the service graph: playlists,
//! multitracks and tractors.

pub mod multitrack;
pub mod playlist;
pub mod tractor;

pub use multitrack::{Multitrack, Whence};
pub use playlist::{ClipInfo, EntryKind, Playlist, PlaylistEntry};
pub use tractor::{Tractor, TransitionBinding};
