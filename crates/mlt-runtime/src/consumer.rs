//! Consumer runtime: prefetch worker, real-time dispatch, purge/stop
//! lifecycle.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use mlt_core::{MltError, MltResult, Profile};
use mlt_frame::Frame;
use mlt_props::{EventPayload, PropertyBag};
use mlt_service::Producer;
use parking_lot::{Mutex, RwLock};

use crate::clock::{decide, DispatchDecision, PlaybackClock};

/// Where a rendered frame goes. Real device/window output is out of scope;
/// the consumer's public surface never names a concrete display backend,
/// so production code and tests alike supply one.
pub trait RenderSink: Send + Sync {
    fn render(&self, frame: &Frame);
}

struct QueuedFrame {
    frame: Frame,
}

struct Shared {
    producer: RwLock<Option<Arc<dyn Producer>>>,
    done: AtomicBool,
    stopped: AtomicBool,
    position: AtomicI64,
    capacity: AtomicUsize,
    fps: f64,
    terminate_on_pause: AtomicBool,
    dropped: AtomicU64,
    shown: AtomicU64,
}

fn producer_speed(producer: &Arc<dyn Producer>) -> f64 {
    let props = producer.props();
    if props.has("_speed") {
        props.get_double("_speed")
    } else {
        1.0
    }
}

pub struct Consumer {
    props: Arc<PropertyBag>,
    sink: Arc<dyn RenderSink>,
    shared: Arc<Shared>,
    real_time: AtomicI64,
    queue_tx: Mutex<Option<Sender<QueuedFrame>>>,
    queue_rx: Mutex<Option<Receiver<QueuedFrame>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    clock: Mutex<Option<PlaybackClock>>,
    put_tx: Sender<Frame>,
    put_rx: Receiver<Frame>,
}

impl Consumer {
    /// `init(profile, id, arg)`: `arg` is an opaque resource locator for a
    /// concrete device/file consumer and is only recorded as a property
    /// here, since no device backend is in scope.
    pub fn init(profile: &Profile, id: &str, arg: Option<&str>, sink: Arc<dyn RenderSink>) -> Self {
        let props = Arc::new(PropertyBag::new());
        props.set_string("mlt_service", id.to_string());
        if let Some(arg) = arg {
            props.set_string("resource", arg.to_string());
        }
        props.set_int("real_time", 1);
        props.set_int("buffer", 25);
        let (put_tx, put_rx) = bounded(1);
        Self {
            props,
            sink,
            shared: Arc::new(Shared {
                producer: RwLock::new(None),
                done: AtomicBool::new(true),
                stopped: AtomicBool::new(true),
                position: AtomicI64::new(0),
                capacity: AtomicUsize::new(25),
                fps: profile.fps.fps(),
                terminate_on_pause: AtomicBool::new(false),
                dropped: AtomicU64::new(0),
                shown: AtomicU64::new(0),
            }),
            real_time: AtomicI64::new(1),
            queue_tx: Mutex::new(None),
            queue_rx: Mutex::new(None),
            worker: Mutex::new(None),
            clock: Mutex::new(None),
            put_tx,
            put_rx,
        }
    }

    pub fn props(&self) -> &Arc<PropertyBag> {
        &self.props
    }

    pub fn connect(&self, producer: Arc<dyn Producer>) {
        *self.shared.producer.write() = Some(producer);
    }

    pub fn set_real_time(&self, n: i64) {
        self.real_time.store(n, Ordering::SeqCst);
        self.props.set_int("real_time", n);
    }

    pub fn set_buffer(&self, depth: usize) {
        let depth = depth.max(1);
        self.shared.capacity.store(depth, Ordering::SeqCst);
        self.props.set_int("buffer", depth as i64);
    }

    pub fn set_terminate_on_pause(&self, enabled: bool) {
        self.shared
            .terminate_on_pause
            .store(enabled, Ordering::SeqCst);
    }

    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::SeqCst)
    }

    pub fn shown(&self) -> u64 {
        self.shared.shown.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    pub fn start(&self) -> MltResult<()> {
        if !self.shared.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.shared.done.store(false, Ordering::SeqCst);
        self.shared.stopped.store(false, Ordering::SeqCst);
        self.shared.position.store(0, Ordering::SeqCst);
        *self.clock.lock() = Some(PlaybackClock::start());

        if self.real_time.load(Ordering::SeqCst) == 0 {
            return Ok(());
        }

        let capacity = self.shared.capacity.load(Ordering::SeqCst).max(1);
        let (tx, rx) = bounded::<QueuedFrame>(capacity);
        *self.queue_tx.lock() = Some(tx.clone());
        *self.queue_rx.lock() = Some(rx);

        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name("mlt-prefetch".into())
            .spawn(move || prefetch_loop(shared, tx))
            .map_err(|e| MltError::Fatal(e.to_string()))?;
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// Sets `done`, wakes the worker (by dropping its send end, which
    /// unblocks both a worker parked on a full queue and `rt_frame`'s
    /// receiver), joins it, then closes whatever is left queued.
    pub fn stop(&self) {
        self.shared.done.store(true, Ordering::SeqCst);
        self.queue_tx.lock().take();
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
        if let Some(rx) = self.queue_rx.lock().take() {
            for queued in rx.try_iter() {
                queued.frame.close();
            }
        }
        self.shared.stopped.store(true, Ordering::SeqCst);
    }

    /// Drops every queued frame without rendering and resets the pipeline
    /// cursor so the next `start` begins fresh.
    pub fn purge(&self) {
        if let Some(rx) = self.queue_rx.lock().as_ref() {
            for queued in rx.try_iter() {
                queued.frame.close();
            }
        }
        self.shared.position.store(0, Ordering::SeqCst);
        *self.clock.lock() = Some(PlaybackClock::start());
    }

    pub fn close(&self) -> MltResult<()> {
        if !self.is_stopped() {
            return Err(MltError::BadArgument(
                "consumer must be stopped before close".into(),
            ));
        }
        Ok(())
    }

    /// "Put mode": an external producer pushes frames directly, bypassing
    /// the attached producer and prefetch queue entirely.
    pub fn put_frame(&self, frame: Frame) -> MltResult<()> {
        self.put_tx
            .send(frame)
            .map_err(|_| MltError::Fatal("put-mode channel closed".into()))
    }

    pub fn get_frame(&self) -> MltResult<Frame> {
        self.put_rx
            .recv_timeout(Duration::from_secs(2))
            .map_err(|_| MltError::Fatal("put-mode frame timed out".into()))
    }

    /// Pops the next frame. A non-RT consumer calls the producer
    /// synchronously; an RT consumer pops the prefetch queue, waiting up to
    /// `2/fps` seconds before reporting an underrun with `Ok(None)`.
    pub fn rt_frame(&self) -> MltResult<Option<Frame>> {
        if self.real_time.load(Ordering::SeqCst) == 0 {
            let producer = self.shared.producer.read().clone();
            return match producer {
                Some(p) => {
                    let index = self.shared.position.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(p.get_frame(index)?))
                }
                None => Ok(None),
            };
        }

        let guard = self.queue_rx.lock();
        let Some(rx) = guard.as_ref() else {
            return Ok(None);
        };
        let timeout = Duration::from_secs_f64(2.0 / self.shared.fps.max(1.0));
        match rx.recv_timeout(timeout) {
            Ok(queued) => Ok(Some(queued.frame)),
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("prefetch queue underrun");
                Ok(None)
            }
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    /// One display cycle: pop a frame, apply the sleep/drop/display
    /// policy, render it and fire `consumer-frame-show`. Returns whether a
    /// frame was actually displayed.
    pub fn dispatch_next(&self) -> MltResult<bool> {
        let Some(frame) = self.rt_frame()? else {
            return Ok(false);
        };
        let clock = self
            .clock
            .lock()
            .as_ref()
            .copied()
            .unwrap_or_else(PlaybackClock::start);
        let index = frame.position();
        let playtime_us = clock.playtime_for(index, self.shared.fps);
        let speed = if frame.props().has("_speed") {
            frame.props().get_double("_speed")
        } else {
            1.0
        };
        let queue_len = self
            .queue_rx
            .lock()
            .as_ref()
            .map(|rx| rx.len())
            .unwrap_or(0);

        match decide(clock.now_us(), playtime_us, speed, queue_len) {
            DispatchDecision::SleepThenDisplay(micros) => {
                if micros > 0 {
                    thread::sleep(Duration::from_micros(micros as u64));
                }
                self.display(frame);
                Ok(true)
            }
            DispatchDecision::Drop => {
                self.shared.dropped.fetch_add(1, Ordering::SeqCst);
                log::info!("dropped frame {index}");
                frame.close();
                Ok(false)
            }
            DispatchDecision::DisplayNow => {
                self.display(frame);
                Ok(true)
            }
        }
    }

    fn display(&self, frame: Frame) {
        self.sink.render(&frame);
        self.shared.shown.fetch_add(1, Ordering::SeqCst);
        self.props.events.fire(
            "consumer-frame-show",
            EventPayload::FrameShow(frame.position()),
        );
    }
}

fn prefetch_loop(shared: Arc<Shared>, tx: Sender<QueuedFrame>) {
    loop {
        if shared.done.load(Ordering::SeqCst) {
            break;
        }
        let producer = shared.producer.read().clone();
        let Some(producer) = producer else { break };

        if shared.terminate_on_pause.load(Ordering::SeqCst) && producer_speed(&producer) == 0.0 {
            shared.stopped.store(true, Ordering::SeqCst);
            break;
        }

        let index = shared.position.fetch_add(1, Ordering::SeqCst);
        match producer.get_frame(index) {
            Ok(frame) => {
                if tx.send(QueuedFrame { frame }).is_err() {
                    break;
                }
            }
            Err(e) => {
                log::warn!("prefetch worker stopping: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlt_core::time::FrameRate;
    use mlt_frame::PixelFormat;
    use mlt_props::PropertyBag as Bag;
    use mlt_service::ProducerCore;
    use std::sync::Mutex as StdMutex;

    struct CountingProducer {
        core: ProducerCore,
    }

    impl Producer for CountingProducer {
        fn core(&self) -> &ProducerCore {
            &self.core
        }
        fn get_frame(&self, index: i64) -> MltResult<Frame> {
            let frame = Frame::init(index);
            frame.set_image(vec![0u8; 3], PixelFormat::Rgb24, 1, 1, None);
            Ok(frame)
        }
    }

    struct RecordingSink {
        positions: StdMutex<Vec<i64>>,
    }

    impl RenderSink for RecordingSink {
        fn render(&self, frame: &Frame) {
            self.positions.lock().unwrap().push(frame.position());
        }
    }

    fn profile_25fps() -> Profile {
        Profile {
            name: "test".into(),
            width: 16,
            height: 16,
            fps: FrameRate::new(25, 1),
            sample_aspect_num: 1,
            sample_aspect_den: 1,
            display_aspect_num: 1,
            display_aspect_den: 1,
            progressive: true,
            colorspace: mlt_core::ColorSpace::Bt709,
        }
    }

    #[test]
    fn non_rt_consumer_pulls_synchronously_in_order() {
        let sink = Arc::new(RecordingSink {
            positions: StdMutex::new(Vec::new()),
        });
        let consumer = Consumer::init(&profile_25fps(), "test", None, sink.clone());
        consumer.set_real_time(0);
        consumer.connect(Arc::new(CountingProducer {
            core: ProducerCore::new(Arc::new(Bag::new()), 10, 25.0),
        }));
        consumer.start().unwrap();
        for _ in 0..5 {
            consumer.dispatch_next().unwrap();
        }
        consumer.stop();
        assert_eq!(*sink.positions.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(consumer.dropped(), 0);
    }

    #[test]
    fn rt_consumer_prefetches_and_shows_frames_in_order() {
        let sink = Arc::new(RecordingSink {
            positions: StdMutex::new(Vec::new()),
        });
        let consumer = Consumer::init(&profile_25fps(), "test", None, sink.clone());
        consumer.set_real_time(1);
        consumer.set_buffer(4);
        consumer.connect(Arc::new(CountingProducer {
            core: ProducerCore::new(Arc::new(Bag::new()), 10, 25.0),
        }));
        consumer.start().unwrap();
        for _ in 0..5 {
            consumer.dispatch_next().unwrap();
        }
        consumer.stop();
        assert_eq!(*sink.positions.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn stop_joins_the_worker_and_marks_stopped() {
        let sink = Arc::new(RecordingSink {
            positions: StdMutex::new(Vec::new()),
        });
        let consumer = Consumer::init(&profile_25fps(), "test", None, sink);
        consumer.connect(Arc::new(CountingProducer {
            core: ProducerCore::new(Arc::new(Bag::new()), 5, 25.0),
        }));
        consumer.start().unwrap();
        assert!(!consumer.is_stopped());
        consumer.stop();
        assert!(consumer.is_stopped());
    }

    #[test]
    fn put_mode_roundtrips_an_externally_supplied_frame() {
        let sink = Arc::new(RecordingSink {
            positions: StdMutex::new(Vec::new()),
        });
        let consumer = Consumer::init(&profile_25fps(), "test", None, sink);
        consumer.put_frame(Frame::init(7)).unwrap();
        let frame = consumer.get_frame().unwrap();
        assert_eq!(frame.position(), 7);
    }
}
