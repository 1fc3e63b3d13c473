//! Placeholder service implementations the reader reconstructs from XML.
//!
//! A real factory dispatches a service's `mlt_service` property to a
//! concrete codec/effect implementation; that dispatch is out of scope
//! here. These leaves carry the parsed property bag and in/out faithfully
//! enough for structural round-trips without pretending to reproduce a
//! plugin's rendering behavior.

use std::sync::Arc;

use mlt_core::MltResult;
use mlt_frame::Frame;
use mlt_props::PropertyBag;
use mlt_service::{Filter, FilterScope, Producer, ProducerCore, Transition};

pub struct GenericProducer {
    core: ProducerCore,
}

impl GenericProducer {
    pub fn new(props: Arc<PropertyBag>, in_point: i64, out_point: i64, fps: f64) -> Arc<Self> {
        let core = ProducerCore::new(props, (out_point - in_point + 1).max(1), fps);
        core.set_in_and_out(in_point, out_point);
        Arc::new(Self { core })
    }
}

impl Producer for GenericProducer {
    fn core(&self) -> &ProducerCore {
        &self.core
    }

    fn get_frame(&self, index: i64) -> MltResult<Frame> {
        Ok(Frame::with_props(self.core.props.clone(), index))
    }
}

pub struct GenericFilter {
    props: Arc<PropertyBag>,
    in_point: i64,
    out_point: i64,
}

impl GenericFilter {
    pub fn new(props: Arc<PropertyBag>, in_point: i64, out_point: i64) -> Arc<Self> {
        Arc::new(Self {
            props,
            in_point,
            out_point,
        })
    }
}

impl Filter for GenericFilter {
    fn process(&self, frame: Frame) -> MltResult<Frame> {
        Ok(frame)
    }

    fn props(&self) -> &Arc<PropertyBag> {
        &self.props
    }

    fn in_out(&self) -> (i64, i64) {
        (self.in_point, self.out_point)
    }

    fn scope(&self) -> FilterScope {
        FilterScope::Tracked
    }
}

pub struct GenericTransition {
    props: Arc<PropertyBag>,
    a_track: usize,
    b_track: usize,
    in_point: i64,
    out_point: i64,
}

impl GenericTransition {
    pub fn new(
        props: Arc<PropertyBag>,
        a_track: usize,
        b_track: usize,
        in_point: i64,
        out_point: i64,
    ) -> Arc<Self> {
        Arc::new(Self {
            props,
            a_track,
            b_track,
            in_point,
            out_point,
        })
    }
}

impl Transition for GenericTransition {
    fn process(&self, a: Frame, _b: Frame) -> MltResult<Frame> {
        Ok(a)
    }

    fn props(&self) -> &Arc<PropertyBag> {
        &self.props
    }

    fn a_track(&self) -> usize {
        self.a_track
    }

    fn b_track(&self) -> usize {
        self.b_track
    }

    fn in_out(&self) -> (i64, i64) {
        (self.in_point, self.out_point)
    }
}
