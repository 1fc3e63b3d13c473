//! Producer-kind service nodes: the common `in`/`out`/position/filter-chain
//! bookkeeping every producer, cut, playlist, multitrack and tractor shares.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use mlt_core::MltResult;
use mlt_frame::Frame;
use mlt_props::PropertyBag;
use parking_lot::RwLock;

use crate::service::Filter;

/// Bookkeeping shared by every producer-kind node. Concrete producers embed
/// a `ProducerCore` and implement `Producer` by delegating to it.
pub struct ProducerCore {
    pub props: Arc<PropertyBag>,
    in_point: AtomicI64,
    out_point: AtomicI64,
    position: AtomicI64,
    length: AtomicI64,
    fps: f64,
    filters: RwLock<Vec<Arc<dyn Filter>>>,
}

impl ProducerCore {
    pub fn new(props: Arc<PropertyBag>, length: i64, fps: f64) -> Self {
        Self {
            props,
            in_point: AtomicI64::new(0),
            out_point: AtomicI64::new((length - 1).max(0)),
            position: AtomicI64::new(0),
            length: AtomicI64::new(length),
            fps,
            filters: RwLock::new(Vec::new()),
        }
    }

    pub fn seek(&self, position: i64) {
        self.position.store(position.max(0), Ordering::SeqCst);
    }

    pub fn position(&self) -> i64 {
        self.position.load(Ordering::SeqCst)
    }

    pub fn prepare_next(&self) {
        self.position.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_in_and_out(&self, in_point: i64, out_point: i64) {
        self.in_point.store(in_point, Ordering::SeqCst);
        self.out_point.store(out_point, Ordering::SeqCst);
    }

    pub fn in_out(&self) -> (i64, i64) {
        (
            self.in_point.load(Ordering::SeqCst),
            self.out_point.load(Ordering::SeqCst),
        )
    }

    pub fn get_length(&self) -> i64 {
        self.length.load(Ordering::SeqCst)
    }

    pub fn set_length(&self, length: i64) {
        self.length.store(length, Ordering::SeqCst);
    }

    pub fn get_playtime(&self) -> i64 {
        let (in_point, out_point) = self.in_out();
        (out_point - in_point + 1).max(0)
    }

    pub fn get_fps(&self) -> f64 {
        self.fps
    }

    pub fn attach(&self, filter: Arc<dyn Filter>) {
        self.filters.write().push(filter);
    }

    /// Removes the first filter pointer-equal to `filter`.
    pub fn detach(&self, filter: &Arc<dyn Filter>) {
        let mut filters = self.filters.write();
        if let Some(idx) = filters
            .iter()
            .position(|f| Arc::ptr_eq(f, filter))
        {
            filters.remove(idx);
        }
    }

    pub fn filter(&self, index: usize) -> Option<Arc<dyn Filter>> {
        self.filters.read().get(index).cloned()
    }

    pub fn filter_count(&self) -> usize {
        self.filters.read().len()
    }

    /// Applies every attached filter whose `[in, out]` range contains
    /// `position`, in attach order.
    pub fn apply_filters(&self, mut frame: Frame, position: i64) -> MltResult<Frame> {
        let snapshot: Vec<Arc<dyn Filter>> = self.filters.read().clone();
        for filter in snapshot {
            let (fin, fout) = filter.in_out();
            if position >= fin && position <= fout {
                frame = filter.process(frame)?;
            }
        }
        Ok(frame)
    }
}

/// Producer-kind service node: something that can yield a `Frame` for a
/// given index. `seek`/`position`/`prepare_next`/filter attach-detach all
/// delegate to the shared `ProducerCore`.
pub trait Producer: Send + Sync {
    fn core(&self) -> &ProducerCore;
    fn get_frame(&self, index: i64) -> MltResult<Frame>;

    fn props(&self) -> &Arc<PropertyBag> {
        &self.core().props
    }

    fn seek(&self, position: i64) {
        self.core().seek(position)
    }

    fn position(&self) -> i64 {
        self.core().position()
    }

    fn prepare_next(&self) {
        self.core().prepare_next()
    }

    fn set_in_and_out(&self, in_point: i64, out_point: i64) {
        self.core().set_in_and_out(in_point, out_point)
    }

    fn in_out(&self) -> (i64, i64) {
        self.core().in_out()
    }

    fn get_length(&self) -> i64 {
        self.core().get_length()
    }

    fn get_playtime(&self) -> i64 {
        self.core().get_playtime()
    }

    fn get_fps(&self) -> f64 {
        self.core().get_fps()
    }

    fn attach(&self, filter: Arc<dyn Filter>) {
        self.core().attach(filter)
    }

    fn detach(&self, filter: &Arc<dyn Filter>) {
        self.core().detach(filter)
    }

    fn filter(&self, index: usize) -> Option<Arc<dyn Filter>> {
        self.core().filter(index)
    }

    /// Clip-boundary positions this producer exposes for jump/next controls.
    /// Most producers have none; a playlist overrides this with its
    /// cumulative entry boundaries.
    fn edit_points(&self) -> Vec<i64> {
        Vec::new()
    }
}

/// A subrange view onto another producer: shares no mutable state with its
/// source beyond reads, but owns its own property bag (inherited from the
/// source) and its own `in`/`out`/filters.
pub struct Cut {
    source: Arc<dyn Producer>,
    core: ProducerCore,
}

impl Cut {
    pub fn new(source: Arc<dyn Producer>, in_point: i64, out_point: i64) -> Self {
        let props = Arc::new(PropertyBag::new());
        props.inherit(source.props());
        let fps = source.get_fps();
        let core = ProducerCore::new(props, out_point - in_point + 1, fps);
        core.set_in_and_out(in_point, out_point);
        Self { source, core }
    }
}

impl Producer for Cut {
    fn core(&self) -> &ProducerCore {
        &self.core
    }

    fn get_frame(&self, index: i64) -> MltResult<Frame> {
        let (in_point, out_point) = self.core.in_out();
        let source_position = (in_point + index).min(out_point);
        let frame = self.source.get_frame(source_position)?;
        self.core.apply_filters(frame, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlt_frame::PixelFormat;
    use std::sync::atomic::AtomicUsize;

    struct ConstantProducer {
        core: ProducerCore,
        value: u8,
    }

    impl Producer for ConstantProducer {
        fn core(&self) -> &ProducerCore {
            &self.core
        }

        fn get_frame(&self, index: i64) -> MltResult<Frame> {
            let frame = Frame::init(index);
            frame.set_image(vec![self.value; 3], PixelFormat::Rgb24, 1, 1, None);
            self.core.apply_filters(frame, index)
        }
    }

    struct CountingFilter {
        props: Arc<PropertyBag>,
        calls: Arc<AtomicUsize>,
    }

    impl Filter for CountingFilter {
        fn process(&self, frame: Frame) -> MltResult<Frame> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(frame)
        }

        fn props(&self) -> &Arc<PropertyBag> {
            &self.props
        }

        fn in_out(&self) -> (i64, i64) {
            (0, 9)
        }
    }

    #[test]
    fn cut_clips_to_source_range_and_renumbers_from_zero() {
        let source = Arc::new(ConstantProducer {
            core: ProducerCore::new(Arc::new(PropertyBag::new()), 100, 25.0),
            value: 7,
        });
        let cut = Cut::new(source, 10, 19);
        assert_eq!(cut.get_playtime(), 10);
        let frame = cut.get_frame(5).unwrap();
        let img = frame.get_image(PixelFormat::Rgb24, 1, 1, false).unwrap();
        assert_eq!(img.buffer.unwrap().as_slice(), &[7, 7, 7]);
    }

    #[test]
    fn filters_outside_their_range_are_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = ConstantProducer {
            core: ProducerCore::new(Arc::new(PropertyBag::new()), 100, 25.0),
            value: 1,
        };
        source.attach(Arc::new(CountingFilter {
            props: Arc::new(PropertyBag::new()),
            calls: calls.clone(),
        }));
        source.get_frame(5).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        source.get_frame(50).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
