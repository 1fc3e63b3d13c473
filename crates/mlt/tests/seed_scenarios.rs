//! End-to-end scenarios exercising the facade's re-exported surface against
//! a handful of small graphs, driving a constructed pipeline rather than
//! unit-testing each node alone.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mlt::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A producer that always yields a solid-color image, standing in for the
/// `color:` producer the reference ships (out of scope here as a concrete
/// codec — see `GenericProducer` in `mlt-xml` for the parsed-document
/// equivalent).
struct ColorProducer {
    core: ProducerCore,
    rgb: [u8; 3],
}

impl ColorProducer {
    fn new(rgb: [u8; 3], length: i64, fps: f64) -> Arc<Self> {
        let props = Arc::new(PropertyBag::new());
        props.set_string("mlt_service", "color");
        Arc::new(Self {
            core: ProducerCore::new(props, length, fps),
            rgb,
        })
    }
}

impl Producer for ColorProducer {
    fn core(&self) -> &ProducerCore {
        &self.core
    }

    fn get_frame(&self, index: i64) -> MltResult<Frame> {
        let frame = Frame::init(index);
        frame.set_image(self.rgb.to_vec(), PixelFormat::Rgb24, 1, 1, None);
        self.core.apply_filters(frame, index)
    }
}

struct RecordingSink {
    positions: Mutex<Vec<i64>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            positions: Mutex::new(Vec::new()),
        })
    }
}

impl RenderSink for RecordingSink {
    fn render(&self, frame: &Frame) {
        self.positions.lock().unwrap().push(frame.position());
    }
}

/// Scenario 1: a five-frame color producer driving a real-time consumer at
/// `atsc_720p_25` should show every frame in order with nothing dropped.
#[test]
fn color_producer_drives_five_frames_in_order() {
    init_logging();
    let profile = Profile::atsc_720p_25();
    let producer = ColorProducer::new([255, 0, 0], 5, profile.fps.fps());
    let sink = RecordingSink::new();
    let consumer = Consumer::init(&profile, "sdl2", None, sink.clone());
    consumer.connect(producer);
    consumer.set_real_time(1);
    consumer.start().unwrap();

    let mut shown = 0;
    let mut attempts = 0;
    while shown < 5 && attempts < 50 {
        if consumer.dispatch_next().unwrap() {
            shown += 1;
        }
        attempts += 1;
    }
    consumer.stop();
    assert_eq!(shown, 5);

    assert_eq!(*sink.positions.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    assert_eq!(consumer.dropped(), 0);
    assert!(consumer.is_stopped());
}

/// Scenario 2: a playlist of two color clips with a blank gap between them
/// exposes the gap as `test_image=1` frames and the correct total length.
#[test]
fn playlist_with_blank_gap_yields_expected_frame_sequence() {
    init_logging();
    let fps = 25.0;
    let red = ColorProducer::new([255, 0, 0], 3, fps);
    let blue = ColorProducer::new([0, 0, 255], 3, fps);

    let playlist = Playlist::new(fps);
    playlist.append_clip(red, 0, 2);
    playlist.append_blank(2);
    playlist.append_clip(blue, 0, 2);

    assert_eq!(playlist.total_length(), 8);

    for index in 0..3 {
        let frame = playlist.get_frame(index).unwrap();
        let img = frame.get_image(PixelFormat::Rgb24, 1, 1, false).unwrap();
        assert_eq!(img.buffer.unwrap().as_slice(), &[255, 0, 0]);
    }
    for index in 3..5 {
        let frame = playlist.get_frame(index).unwrap();
        assert_eq!(frame.props().get_int("test_image"), 1);
    }
    for index in 5..8 {
        let frame = playlist.get_frame(index).unwrap();
        let img = frame.get_image(PixelFormat::Rgb24, 1, 1, false).unwrap();
        assert_eq!(img.buffer.unwrap().as_slice(), &[0, 0, 255]);
    }
}

/// Scenario 3: animated property serialization round-trips through the
/// terse grammar and samples linearly between two keyframes.
#[test]
fn animated_property_serializes_and_samples_linearly() {
    init_logging();
    let props = PropertyBag::with_fps(FrameRate::new(25, 1));
    props
        .anim_set("foo", AnimValue::Double(0.0), 0, 100, KeyframeType::Linear)
        .unwrap();
    props
        .anim_set("foo", AnimValue::Double(1.0), 100, 100, KeyframeType::Linear)
        .unwrap();

    assert_eq!(props.get_string("foo").unwrap(), "0=0;100=1");
    assert!((props.anim_get_double("foo", 50, 100) - 0.5).abs() < 1e-9);

    let anim = Animation::parse("0=0;100=1", 100, FrameRate::new(25, 1), NumericLocale::default(), false)
        .unwrap();
    assert_eq!(
        anim.serialize(TimeFormat::Clock),
        "00:00:00.000=0;00:00:04.000=1"
    );
}

/// Scenario 4: when rendering is the bottleneck, the consumer's sync clock
/// drops stale backlogged frames rather than letting latency grow
/// unbounded, while the frames it does show stay in position order.
#[test]
fn slow_render_sink_drops_backlogged_frames_but_stays_monotonic() {
    init_logging();

    struct SlowSink {
        positions: Mutex<Vec<i64>>,
    }
    impl RenderSink for SlowSink {
        fn render(&self, frame: &Frame) {
            std::thread::sleep(Duration::from_millis(80));
            self.positions.lock().unwrap().push(frame.position());
        }
    }

    struct InstantProducer {
        core: ProducerCore,
    }
    impl Producer for InstantProducer {
        fn core(&self) -> &ProducerCore {
            &self.core
        }
        fn get_frame(&self, index: i64) -> MltResult<Frame> {
            let frame = Frame::init(index);
            frame.set_image(vec![0u8; 3], PixelFormat::Rgb24, 1, 1, None);
            Ok(frame)
        }
    }

    let profile = Profile::atsc_720p_25();
    let sink = Arc::new(SlowSink {
        positions: Mutex::new(Vec::new()),
    });
    let consumer = Consumer::init(&profile, "sdl2", None, sink.clone());
    consumer.set_real_time(1);
    consumer.set_buffer(10);
    consumer.connect(Arc::new(InstantProducer {
        core: ProducerCore::new(Arc::new(PropertyBag::new()), 1000, profile.fps.fps()),
    }));
    consumer.start().unwrap();

    let total: usize = 60;
    for _ in 0..total {
        consumer.dispatch_next().unwrap();
    }
    consumer.stop();

    let dropped = consumer.dropped();
    assert!(dropped > 0, "expected at least one frame to be dropped under backlog");
    assert!((dropped as usize) < total, "not every frame should be dropped");

    let shown = sink.positions.lock().unwrap();
    let mut previous = -1i64;
    for &position in shown.iter() {
        assert!(position > previous, "frame positions must stay monotonic");
        previous = position;
    }
}

/// Scenario 5: a tractor with two playlist tracks (two color clips each)
/// and one luma transition round-trips through the XML codec byte-for-byte
/// after the first parse.
#[test]
fn tractor_with_playlists_and_transition_round_trips_through_xml() {
    init_logging();
    let profile = Profile::atsc_720p_25();
    let fps = profile.fps.fps();

    let build_playlist = || {
        let playlist = Arc::new(Playlist::new(fps));
        playlist.append_clip(ColorProducer::new([255, 0, 0], 12, fps), 0, 11);
        playlist.append_clip(ColorProducer::new([0, 0, 255], 12, fps), 0, 11);
        playlist
    };
    let track_a = build_playlist();
    let track_b = build_playlist();

    let multitrack = Arc::new(Multitrack::new(fps));
    multitrack.connect(0, track_a.clone());
    multitrack.connect(1, track_b.clone());
    let tractor = Arc::new(Tractor::new(multitrack, fps));

    let transition_props = PropertyBag::with_fps(profile.fps);
    transition_props.set_string("mlt_service", "luma");
    tractor.add_transition(TransitionBinding {
        transition: mlt_xml::GenericTransition::new(Arc::new(transition_props), 0, 1, 0, 23),
        a_track: 0,
        b_track: 1,
        in_point: 0,
        out_point: 23,
    });

    let tracks = vec![TrackNode::Playlist(track_a), TrackNode::Playlist(track_b)];
    let doc = Document::new(profile, RootNode::Tractor(tractor, tracks));

    let first_xml = serialize_xml(&doc).unwrap();
    let parsed = parse_xml(&first_xml).unwrap();
    let second_xml = serialize_xml(&parsed).unwrap();
    let reparsed = parse_xml(&second_xml).unwrap();
    let third_xml = serialize_xml(&reparsed).unwrap();

    assert_eq!(second_xml, third_xml);
    match parsed.root {
        RootNode::Tractor(t, tracks) => {
            assert_eq!(tracks.len(), 2);
            assert_eq!(t.transitions().len(), 1);
        }
        _ => panic!("expected a tractor root"),
    }
}

/// Scenario 6: a capacity-2 cache partition evicts the least-recently-used
/// entry, running its destructor exactly once, while the survivors stay
/// reachable.
#[test]
fn cache_eviction_respects_capacity_and_runs_destructor_once() {
    init_logging();
    let cache = ServiceCache::new(4);
    cache.set_capacity(1, "test", 2);

    let destroyed_a = Arc::new(AtomicUsize::new(0));
    let da = destroyed_a.clone();
    cache.put(1, "test", "a", Arc::new(1u8), 1, Some(Arc::new(move || {
        da.fetch_add(1, Ordering::SeqCst);
    })));
    cache.put(1, "test", "b", Arc::new(2u8), 1, None);
    cache.put(1, "test", "c", Arc::new(3u8), 1, None);

    assert!(cache.get(1, "test", "a").is_none());
    assert_eq!(destroyed_a.load(Ordering::SeqCst), 1);
    assert!(cache.get(1, "test", "b").is_some());
    assert!(cache.get(1, "test", "c").is_some());
}
