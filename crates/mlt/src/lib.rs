//! Facade crate: the `Engine` handle for process-wide global state, a
//! prelude gathering every sub-crate's public surface, and the `melt`
//! verb-table parser.

pub mod cli;
pub mod engine;
pub mod prelude;

pub use engine::Engine;
