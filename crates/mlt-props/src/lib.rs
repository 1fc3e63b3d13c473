//! Property bags and the event bus they carry.
//!
//! Builds on `mlt-core` for error types, locale and time parsing, and
//! `mlt-anim` for the animated-value promotion path a string property
//! takes on when it gains keyframes.

pub mod bag;
pub mod events;
pub mod value;

pub use bag::PropertyBag;
pub use events::{EventBus, EventPayload};
pub use value::PropertyValue;
