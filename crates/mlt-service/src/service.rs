//! Shared vocabulary for service-graph nodes.

use std::sync::Arc;

use mlt_core::MltResult;
use mlt_frame::Frame;
use mlt_props::PropertyBag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Producer,
    Filter,
    Transition,
    Consumer,
}

/// Whether a filter applies once per track before composition, or once to
/// the composed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterScope {
    Tracked,
    Output,
}

/// `process(frame) -> Frame`: by convention a filter pushes its own closure
/// onto the frame's image/audio stacks and returns the same frame; the
/// pixel-level work runs lazily when a consumer calls `get_image`.
pub trait Filter: Send + Sync {
    fn process(&self, frame: Frame) -> MltResult<Frame>;
    fn props(&self) -> &Arc<PropertyBag>;
    fn in_out(&self) -> (i64, i64);
    fn scope(&self) -> FilterScope {
        FilterScope::Tracked
    }
}

/// `process(a_frame, b_frame) -> Frame`: composes a fore and back frame.
pub trait Transition: Send + Sync {
    fn process(&self, a: Frame, b: Frame) -> MltResult<Frame>;
    fn props(&self) -> &Arc<PropertyBag>;
    fn a_track(&self) -> usize;
    fn b_track(&self) -> usize;
    fn in_out(&self) -> (i64, i64);
}
