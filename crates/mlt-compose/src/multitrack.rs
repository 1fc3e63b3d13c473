//! `Multitrack`: a fixed set of track producers addressed by index.

use std::sync::Arc;

use mlt_core::MltResult;
use mlt_frame::Frame;
use mlt_props::PropertyBag;
use mlt_service::{Producer, ProducerCore};
use parking_lot::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

pub struct Multitrack {
    core: ProducerCore,
    tracks: RwLock<Vec<Option<Arc<dyn Producer>>>>,
}

impl Multitrack {
    pub fn new(fps: f64) -> Self {
        Self {
            core: ProducerCore::new(Arc::new(PropertyBag::new()), 0, fps),
            tracks: RwLock::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.tracks.read().len()
    }

    pub fn connect(&self, track_index: usize, producer: Arc<dyn Producer>) {
        let mut tracks = self.tracks.write();
        if track_index >= tracks.len() {
            tracks.resize(track_index + 1, None);
        }
        tracks[track_index] = Some(producer);
        drop(tracks);
        self.recompute_length();
    }

    pub fn disconnect(&self, track_index: usize) {
        let mut tracks = self.tracks.write();
        if let Some(slot) = tracks.get_mut(track_index) {
            *slot = None;
        }
        drop(tracks);
        self.recompute_length();
    }

    pub fn track(&self, track_index: usize) -> Option<Arc<dyn Producer>> {
        self.tracks.read().get(track_index).cloned().flatten()
    }

    fn recompute_length(&self) {
        let max_len = self
            .tracks
            .read()
            .iter()
            .flatten()
            .map(|p| p.get_length())
            .max()
            .unwrap_or(0);
        self.core.set_length(max_len);
        self.core.set_in_and_out(0, (max_len - 1).max(0));
    }

    /// The *index*-th clip boundary across every connected track, relative
    /// to `whence`.
    pub fn clip(&self, whence: Whence, index: usize) -> i64 {
        let mut points: Vec<i64> = self
            .tracks
            .read()
            .iter()
            .flatten()
            .flat_map(|p| p.edit_points())
            .collect();
        points.sort_unstable();
        points.dedup();
        match whence {
            Whence::Start => points.get(index).copied().unwrap_or(0),
            Whence::Current => {
                let cur = self.core.position();
                points
                    .into_iter()
                    .filter(|&p| p > cur)
                    .nth(index)
                    .unwrap_or(cur)
            }
            Whence::End => points.into_iter().rev().nth(index).unwrap_or(0),
        }
    }
}

impl Producer for Multitrack {
    fn core(&self) -> &ProducerCore {
        &self.core
    }

    /// `track_index`, not a frame position: the multitrack's own position
    /// cursor (set via `seek`) drives every track's pull, and the
    /// multitrack's own length is the longest track's length.
    fn get_frame(&self, index: i64) -> MltResult<Frame> {
        let position = self.core.position();
        match self.track(index as usize) {
            Some(producer) if position < producer.get_length() => producer.get_frame(position),
            _ => Ok(Frame::init(position)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLengthProducer {
        core: ProducerCore,
    }

    impl Producer for FixedLengthProducer {
        fn core(&self) -> &ProducerCore {
            &self.core
        }
        fn get_frame(&self, index: i64) -> MltResult<Frame> {
            Ok(Frame::init(index))
        }
    }

    fn track(length: i64) -> Arc<dyn Producer> {
        Arc::new(FixedLengthProducer {
            core: ProducerCore::new(Arc::new(PropertyBag::new()), length, 25.0),
        })
    }

    #[test]
    fn length_is_the_max_of_connected_tracks() {
        let mt = Multitrack::new(25.0);
        mt.connect(0, track(50));
        mt.connect(1, track(200));
        assert_eq!(mt.get_length(), 200);
    }

    #[test]
    fn pulling_past_a_tracks_own_end_yields_a_blank_frame() {
        let mt = Multitrack::new(25.0);
        mt.connect(0, track(10));
        mt.seek(50);
        let frame = mt.get_frame(0).unwrap();
        assert_eq!(frame.position(), 50);
    }
}
