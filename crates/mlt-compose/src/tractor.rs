//! `Tractor`: a producer that composites a multitrack through an ordered
//! list of transitions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mlt_core::MltResult;
use mlt_frame::Frame;
use mlt_props::PropertyBag;
use mlt_service::{Producer, ProducerCore, Transition};
use parking_lot::RwLock;

use crate::multitrack::Multitrack;

#[derive(Clone)]
pub struct TransitionBinding {
    pub transition: Arc<dyn Transition>,
    pub a_track: usize,
    pub b_track: usize,
    pub in_point: i64,
    pub out_point: i64,
}

pub struct Tractor {
    core: ProducerCore,
    multitrack: Arc<Multitrack>,
    transitions: RwLock<Vec<TransitionBinding>>,
    /// When set, seeking the tractor re-seeks every connected track's
    /// producer to the same position, rather than only the track the
    /// requesting consumer reads from.
    global_feed: AtomicBool,
}

impl Tractor {
    pub fn new(multitrack: Arc<Multitrack>, fps: f64) -> Self {
        let length = multitrack.get_length();
        Self {
            core: ProducerCore::new(Arc::new(PropertyBag::new()), length, fps),
            multitrack,
            transitions: RwLock::new(Vec::new()),
            global_feed: AtomicBool::new(false),
        }
    }

    pub fn set_global_feed(&self, enabled: bool) {
        self.global_feed.store(enabled, Ordering::SeqCst);
    }

    pub fn add_transition(&self, binding: TransitionBinding) {
        self.transitions.write().push(binding);
    }

    pub fn multitrack(&self) -> &Arc<Multitrack> {
        &self.multitrack
    }

    pub fn transitions(&self) -> Vec<TransitionBinding> {
        self.transitions.read().clone()
    }
}

impl Producer for Tractor {
    fn core(&self) -> &ProducerCore {
        &self.core
    }

    /// Re-seeks the underlying multitrack (and, under `global_feed`, every
    /// connected track producer directly) before pulling.
    fn seek(&self, position: i64) {
        self.core.seek(position);
        self.multitrack.seek(position);
        if self.global_feed.load(Ordering::SeqCst) {
            for idx in 0..self.multitrack.count() {
                if let Some(track) = self.multitrack.track(idx) {
                    track.seek(position);
                }
            }
        }
    }

    fn get_frame(&self, position: i64) -> MltResult<Frame> {
        self.multitrack.seek(position);
        let track_count = self.multitrack.count();
        let mut frames: Vec<Frame> = (0..track_count)
            .map(|i| self.multitrack.get_frame(i as i64))
            .collect::<MltResult<Vec<Frame>>>()?;

        let bindings = self.transitions.read();
        for binding in bindings.iter() {
            if position < binding.in_point || position > binding.out_point {
                continue;
            }
            if binding.a_track >= frames.len() || binding.b_track >= frames.len() {
                continue;
            }
            let a = std::mem::replace(&mut frames[binding.a_track], Frame::init(position));
            let b = std::mem::replace(&mut frames[binding.b_track], Frame::init(position));
            let composed = binding.transition.process(a, b)?;
            frames[binding.a_track] = composed;
        }

        let output = frames
            .into_iter()
            .next()
            .unwrap_or_else(|| Frame::init(position));
        self.core.apply_filters(output, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlt_frame::PixelFormat;

    struct ConstantTrack {
        core: ProducerCore,
        value: u8,
    }

    impl Producer for ConstantTrack {
        fn core(&self) -> &ProducerCore {
            &self.core
        }
        fn get_frame(&self, index: i64) -> MltResult<Frame> {
            let frame = Frame::init(index);
            frame.set_image(vec![self.value; 3], PixelFormat::Rgb24, 1, 1, None);
            Ok(frame)
        }
    }

    struct AverageTransition;

    impl Transition for AverageTransition {
        fn process(&self, a: Frame, b: Frame) -> MltResult<Frame> {
            let ia = a.get_image(PixelFormat::Rgb24, 1, 1, false)?;
            let ib = b.get_image(PixelFormat::Rgb24, 1, 1, false)?;
            let da = ia.buffer.unwrap().as_slice().to_vec();
            let db = ib.buffer.unwrap().as_slice().to_vec();
            let mixed: Vec<u8> = da.iter().zip(db.iter()).map(|(x, y)| ((*x as u16 + *y as u16) / 2) as u8).collect();
            let out = Frame::init(a.position());
            out.set_image(mixed, PixelFormat::Rgb24, 1, 1, None);
            Ok(out)
        }
        fn props(&self) -> &Arc<PropertyBag> {
            unimplemented!("test stub")
        }
        fn a_track(&self) -> usize {
            0
        }
        fn b_track(&self) -> usize {
            1
        }
        fn in_out(&self) -> (i64, i64) {
            (0, 100)
        }
    }

    #[test]
    fn transition_composes_two_tracks_into_track_zero() {
        let mt = Arc::new(Multitrack::new(25.0));
        mt.connect(
            0,
            Arc::new(ConstantTrack {
                core: ProducerCore::new(Arc::new(PropertyBag::new()), 100, 25.0),
                value: 0,
            }),
        );
        mt.connect(
            1,
            Arc::new(ConstantTrack {
                core: ProducerCore::new(Arc::new(PropertyBag::new()), 100, 25.0),
                value: 100,
            }),
        );
        let tractor = Tractor::new(mt, 25.0);
        tractor.add_transition(TransitionBinding {
            transition: Arc::new(AverageTransition),
            a_track: 0,
            b_track: 1,
            in_point: 0,
            out_point: 50,
        });
        let frame = tractor.get_frame(10).unwrap();
        let img = frame.get_image(PixelFormat::Rgb24, 1, 1, false).unwrap();
        assert_eq!(img.buffer.unwrap().as_slice(), &[50, 50, 50]);
    }
}
