//! Lazy per-position frame object pulled through a service graph.
//!
//! Image and audio are closure stacks rather than eagerly rendered
//! buffers — nothing decodes or composites until a consumer asks for a
//! concrete image or audio block.

pub mod buffer;
pub mod formats;
pub mod frame;

pub use buffer::{Buffer, Destructor};
pub use formats::{AudioFormat, PixelFormat};
pub use frame::{AudioRequest, AudioResult, Frame, GetAudioFn, GetImageFn, ImageRequest, ImageResult};
