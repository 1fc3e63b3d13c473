//! `Playlist`: an ordered sequence of clip and blank entries.

use std::sync::Arc;

use mlt_core::MltResult;
use mlt_frame::{Frame, PixelFormat};
use mlt_props::PropertyBag;
use mlt_service::{Filter, Producer, ProducerCore, Transition};
use parking_lot::RwLock;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Clip,
    Blank,
}

pub struct PlaylistEntry {
    pub kind: EntryKind,
    pub producer: Option<Arc<dyn Producer>>,
    pub in_point: i64,
    pub out_point: i64,
    pub repeat: u32,
    pub filters: SmallVec<[Arc<dyn Filter>; 4]>,
}

impl PlaylistEntry {
    fn unit_length(&self) -> i64 {
        (self.out_point - self.in_point + 1).max(0)
    }

    fn total_length(&self) -> i64 {
        self.unit_length() * self.repeat.max(1) as i64
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClipInfo {
    pub index: usize,
    pub kind: EntryKind,
    pub start: i64,
    pub length: i64,
    pub in_point: i64,
    pub out_point: i64,
    pub repeat: u32,
}

/// Backs the synthetic entry `mix` inserts between two overlapped cuts: pulls
/// the same local position from both source producers, offset to where each
/// one's overlap region begins, and blends them through `transition` (or just
/// takes the incoming clip, for a straight cut, when there is none).
struct MixProducer {
    core: ProducerCore,
    a: Arc<dyn Producer>,
    a_in: i64,
    b: Arc<dyn Producer>,
    b_in: i64,
    transition: Option<Arc<dyn Transition>>,
}

impl Producer for MixProducer {
    fn core(&self) -> &ProducerCore {
        &self.core
    }

    fn get_frame(&self, index: i64) -> MltResult<Frame> {
        let a_frame = self.a.get_frame(self.a_in + index)?;
        let b_frame = self.b.get_frame(self.b_in + index)?;
        match &self.transition {
            Some(transition) => transition.process(a_frame, b_frame),
            None => Ok(b_frame),
        }
    }
}

pub struct Playlist {
    core: ProducerCore,
    entries: RwLock<Vec<PlaylistEntry>>,
}

impl Playlist {
    pub fn new(fps: f64) -> Self {
        Self {
            core: ProducerCore::new(Arc::new(PropertyBag::new()), 0, fps),
            entries: RwLock::new(Vec::new()),
        }
    }

    fn recompute_length(&self) {
        let total: i64 = self.entries.read().iter().map(|e| e.total_length()).sum();
        self.core.set_length(total);
        self.core.set_in_and_out(0, (total - 1).max(0));
    }

    pub fn append_clip(&self, producer: Arc<dyn Producer>, in_point: i64, out_point: i64) {
        self.entries.write().push(PlaylistEntry {
            kind: EntryKind::Clip,
            producer: Some(producer),
            in_point,
            out_point,
            repeat: 1,
            filters: SmallVec::new(),
        });
        self.recompute_length();
    }

    pub fn append_blank(&self, length: i64) {
        self.entries.write().push(PlaylistEntry {
            kind: EntryKind::Blank,
            producer: None,
            in_point: 0,
            out_point: (length - 1).max(0),
            repeat: 1,
            filters: SmallVec::new(),
        });
        self.recompute_length();
    }

    pub fn insert_at(&self, index: usize, entry: PlaylistEntry) {
        let mut entries = self.entries.write();
        let index = index.min(entries.len());
        entries.insert(index, entry);
        drop(entries);
        self.recompute_length();
    }

    pub fn remove(&self, index: usize) -> Option<PlaylistEntry> {
        let mut entries = self.entries.write();
        if index >= entries.len() {
            return None;
        }
        let removed = entries.remove(index);
        drop(entries);
        self.recompute_length();
        Some(removed)
    }

    /// Splits entry `index` at `relative` (a local position inside that
    /// entry) into two consecutive entries covering the same source range.
    pub fn split(&self, index: usize, relative: i64) {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get(index) else {
            return;
        };
        if relative <= 0 || relative >= entry.unit_length() {
            return;
        }
        let split_point = entry.in_point + relative;
        let tail = PlaylistEntry {
            kind: entry.kind,
            producer: entry.producer.clone(),
            in_point: split_point,
            out_point: entry.out_point,
            repeat: 1,
            filters: entry.filters.clone(),
        };
        let head_out = split_point - 1;
        entries[index].out_point = head_out;
        entries[index].repeat = 1;
        entries.insert(index + 1, tail);
        drop(entries);
        self.recompute_length();
    }

    /// Replaces entry `index` with `clips` joined in sequence, `split`
    /// controlling whether the original entry's repeat count is preserved
    /// across the join or flattened to one play-through each.
    pub fn join(&self, index: usize, clips: Vec<PlaylistEntry>, split: bool) {
        let mut entries = self.entries.write();
        if index >= entries.len() {
            return;
        }
        entries.remove(index);
        for (offset, mut clip) in clips.into_iter().enumerate() {
            if !split {
                clip.repeat = 1;
            }
            entries.insert(index + offset, clip);
        }
        drop(entries);
        self.recompute_length();
    }

    /// Overlaps entries `index` and `index + 1` over `length` frames,
    /// replacing the tail of the first and the head of the second with a
    /// single mixed entry driven by `transition`. Shortens the playlist's
    /// total length by the overlap, since that span now plays once instead
    /// of twice.
    pub fn mix(&self, index: usize, length: i64, transition: Option<Arc<dyn Transition>>) {
        let mut entries = self.entries.write();
        if length <= 0 || index + 1 >= entries.len() {
            return;
        }
        let overlap = length
            .min(entries[index].unit_length())
            .min(entries[index + 1].unit_length());
        if overlap <= 0 {
            return;
        }
        let Some(a_producer) = entries[index].producer.clone() else {
            return;
        };
        let Some(b_producer) = entries[index + 1].producer.clone() else {
            return;
        };

        let a_overlap_in = entries[index].out_point - overlap + 1;
        let b_overlap_in = entries[index + 1].in_point;

        entries[index].out_point = a_overlap_in - 1;
        entries[index + 1].in_point = b_overlap_in + overlap;

        let mix_entry = PlaylistEntry {
            kind: EntryKind::Clip,
            producer: Some(Arc::new(MixProducer {
                core: ProducerCore::new(Arc::new(PropertyBag::new()), overlap, self.core.get_fps()),
                a: a_producer,
                a_in: a_overlap_in,
                b: b_producer,
                b_in: b_overlap_in,
                transition,
            })),
            in_point: 0,
            out_point: overlap - 1,
            repeat: 1,
            filters: SmallVec::new(),
        };
        entries.insert(index + 1, mix_entry);
        drop(entries);
        self.recompute_length();
    }

    pub fn clip_count(&self) -> usize {
        self.entries.read().len()
    }

    pub fn clip_length(&self, index: usize) -> i64 {
        self.entries
            .read()
            .get(index)
            .map(|e| e.total_length())
            .unwrap_or(0)
    }

    pub fn total_length(&self) -> i64 {
        self.core.get_length()
    }

    /// The producer backing entry `index`, or `None` for a blank gap or an
    /// out-of-range index. Used by the XML codec to resolve id references.
    pub fn entry_producer(&self, index: usize) -> Option<Arc<dyn Producer>> {
        self.entries.read().get(index)?.producer.clone()
    }

    pub fn clip_info(&self, index: usize) -> Option<ClipInfo> {
        let entries = self.entries.read();
        let entry = entries.get(index)?;
        let start: i64 = entries[..index].iter().map(|e| e.total_length()).sum();
        Some(ClipInfo {
            index,
            kind: entry.kind,
            start,
            length: entry.total_length(),
            in_point: entry.in_point,
            out_point: entry.out_point,
            repeat: entry.repeat,
        })
    }

    /// Resolves a playlist-relative `position` to `(entry_index,
    /// local_position, repeat_iteration)`.
    fn resolve(&self, position: i64) -> Option<(usize, i64, u32)> {
        let entries = self.entries.read();
        let mut remaining = position.max(0);
        for (idx, entry) in entries.iter().enumerate() {
            let total = entry.total_length();
            if remaining < total {
                let unit = entry.unit_length().max(1);
                let iteration = (remaining / unit) as u32;
                let local = remaining % unit;
                return Some((idx, local, iteration));
            }
            remaining -= total;
        }
        None
    }
}

impl Producer for Playlist {
    fn core(&self) -> &ProducerCore {
        &self.core
    }

    fn get_frame(&self, index: i64) -> MltResult<Frame> {
        let Some((entry_idx, local, _iteration)) = self.resolve(index) else {
            return Ok(blank_frame(index));
        };
        let entries = self.entries.read();
        let entry = &entries[entry_idx];
        let frame = match entry.kind {
            EntryKind::Blank => blank_frame(index),
            EntryKind::Clip => {
                let producer = entry.producer.clone().expect("clip entry without producer");
                let source_position = entry.in_point + local;
                producer.seek(source_position);
                producer.get_frame(source_position)?
            }
        };
        let mut frame = frame;
        for filter in entry.filters.iter() {
            frame = filter.process(frame)?;
        }
        Ok(frame)
    }

    /// Cumulative clip-boundary positions, used by `Multitrack::clip` to
    /// answer jump/next queries across all connected tracks.
    fn edit_points(&self) -> Vec<i64> {
        let entries = self.entries.read();
        let mut points = Vec::with_capacity(entries.len() + 1);
        let mut cursor = 0i64;
        for entry in entries.iter() {
            points.push(cursor);
            cursor += entry.total_length();
        }
        points.push(cursor);
        points
    }
}

fn blank_frame(position: i64) -> Frame {
    let frame = Frame::init(position);
    frame.props().set_int("test_image", 1);
    frame.props().set_int("test_audio", 1);
    frame.set_image(Vec::new(), PixelFormat::None, 0, 0, None);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlt_service::ProducerCore as Core;

    struct StubProducer {
        core: Core,
    }

    impl Producer for StubProducer {
        fn core(&self) -> &Core {
            &self.core
        }
        fn get_frame(&self, index: i64) -> MltResult<Frame> {
            Ok(Frame::init(index))
        }
    }

    fn stub(length: i64) -> Arc<dyn Producer> {
        Arc::new(StubProducer {
            core: Core::new(Arc::new(PropertyBag::new()), length, 25.0),
        })
    }

    #[test]
    fn append_clip_and_blank_accumulate_total_length() {
        let pl = Playlist::new(25.0);
        pl.append_clip(stub(100), 0, 9);
        pl.append_blank(5);
        assert_eq!(pl.clip_count(), 2);
        assert_eq!(pl.total_length(), 15);
        assert_eq!(pl.clip_length(0), 10);
        assert_eq!(pl.clip_length(1), 5);
    }

    #[test]
    fn blank_entry_yields_test_image_and_audio_markers() {
        let pl = Playlist::new(25.0);
        pl.append_blank(5);
        let frame = pl.get_frame(2).unwrap();
        assert_eq!(frame.props().get_int("test_image"), 1);
        assert_eq!(frame.props().get_int("test_audio"), 1);
    }

    #[test]
    fn clip_info_reports_cumulative_start() {
        let pl = Playlist::new(25.0);
        pl.append_clip(stub(100), 0, 9);
        pl.append_blank(5);
        let info = pl.clip_info(1).unwrap();
        assert_eq!(info.start, 10);
        assert_eq!(info.kind, EntryKind::Blank);
    }

    #[test]
    fn remove_recomputes_total_length() {
        let pl = Playlist::new(25.0);
        pl.append_clip(stub(100), 0, 9);
        pl.append_blank(5);
        pl.remove(0);
        assert_eq!(pl.clip_count(), 1);
        assert_eq!(pl.total_length(), 5);
    }
}
