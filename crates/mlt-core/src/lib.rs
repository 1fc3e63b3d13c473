//! Shared primitives for the MLT framework core.
//!
//! This crate has no dependency on any other crate in the workspace; it
//! provides the error taxonomy, locale-aware numeric parsing, position/time
//! grammars, path rebasing, the video profile descriptor, and process
//! environment resolution that every higher-level component builds on.

pub mod env;
pub mod error;
pub mod locale;
pub mod path;
pub mod profile;
pub mod time;

pub use error::{MltError, MltResult};
pub use locale::NumericLocale;
pub use profile::{ColorSpace, Profile};
pub use time::{FrameRate, TimeFormat};
