//! Two-pass XML codec for the service graph: producers, playlists and
//! tractors.

pub mod leaf;
pub mod model;
pub mod read;
pub mod registry;
pub mod write;

pub use leaf::{GenericFilter, GenericProducer, GenericTransition};
pub use model::{Document, RootNode, TrackNode};
pub use read::parse;
pub use write::serialize;
