//! `Frame`: the lazy, position-identified carrier pulled through a service
//! graph.

use std::sync::Arc;

use mlt_core::MltResult;
use mlt_props::PropertyBag;
use parking_lot::Mutex;

use crate::buffer::{Buffer, Destructor};
use crate::formats::{AudioFormat, PixelFormat};

/// In/out parameters for one `get_image` unwind step.
pub struct ImageRequest {
    pub buffer: Option<Buffer>,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub writable: bool,
}

pub struct AudioRequest {
    pub buffer: Option<Buffer>,
    pub format: AudioFormat,
    pub frequency: u32,
    pub channels: u32,
    pub samples: u32,
}

#[derive(Debug, Clone)]
pub struct ImageResult {
    pub buffer: Option<Buffer>,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct AudioResult {
    pub buffer: Option<Buffer>,
    pub format: AudioFormat,
    pub frequency: u32,
    pub channels: u32,
    pub samples: u32,
}

/// A closure pushed by a filter or producer onto a frame's image stack. It
/// may call back into `Frame::get_image` to pull the layer beneath it,
/// recursively unwinding the stack down to the producer's own closure.
pub type GetImageFn = Box<dyn FnOnce(&Frame, &mut ImageRequest) -> MltResult<()> + Send>;
pub type GetAudioFn = Box<dyn FnOnce(&Frame, &mut AudioRequest) -> MltResult<()> + Send>;

/// Lazy per-position frame object. Image and audio are LIFO stacks of
/// closures rather than eagerly rendered buffers; nothing decodes or
/// composites until a consumer calls `get_image`/`get_audio`.
pub struct Frame {
    props: Arc<PropertyBag>,
    position: i64,
    original_position: i64,
    image_stack: Mutex<Vec<GetImageFn>>,
    audio_stack: Mutex<Vec<GetAudioFn>>,
    alpha: Mutex<Option<Buffer>>,
}

impl Frame {
    /// A `Frame` only needs a source service's property bag to seed its own
    /// (for `test_image`/`test_audio` and similar per-frame metadata), not
    /// the service object itself, since `mlt-service` is a downstream
    /// dependent of this crate.
    pub fn init(position: i64) -> Self {
        Self {
            props: Arc::new(PropertyBag::new()),
            position,
            original_position: position,
            image_stack: Mutex::new(Vec::new()),
            audio_stack: Mutex::new(Vec::new()),
            alpha: Mutex::new(None),
        }
    }

    pub fn with_props(props: Arc<PropertyBag>, position: i64) -> Self {
        Self {
            props,
            position,
            original_position: position,
            image_stack: Mutex::new(Vec::new()),
            audio_stack: Mutex::new(Vec::new()),
            alpha: Mutex::new(None),
        }
    }

    pub fn props(&self) -> &Arc<PropertyBag> {
        &self.props
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn original_position(&self) -> i64 {
        self.original_position
    }

    pub fn set_position(&mut self, position: i64) {
        self.position = position;
    }

    pub fn push_get_image(&self, f: GetImageFn) {
        self.image_stack.lock().push(f);
    }

    pub fn pop_get_image(&self) -> Option<GetImageFn> {
        self.image_stack.lock().pop()
    }

    pub fn push_audio(&self, f: GetAudioFn) {
        self.audio_stack.lock().push(f);
    }

    pub fn pop_audio(&self) -> Option<GetAudioFn> {
        self.audio_stack.lock().pop()
    }

    /// Stores a directly-available image by pushing a terminal closure onto
    /// the stack — the bottom-most link every filter's closure eventually
    /// unwinds to, writing the pixels directly into the request.
    pub fn set_image(
        &self,
        data: Vec<u8>,
        format: PixelFormat,
        width: u32,
        height: u32,
        destructor: Option<Destructor>,
    ) {
        let buffer = match destructor {
            Some(d) => Buffer::with_destructor(data, d),
            None => Buffer::owned(data),
        };
        self.push_get_image(Box::new(move |_frame, req| {
            req.buffer = Some(buffer);
            req.format = format;
            req.width = width;
            req.height = height;
            Ok(())
        }));
    }

    pub fn set_audio(
        &self,
        data: Vec<u8>,
        format: AudioFormat,
        frequency: u32,
        channels: u32,
        samples: u32,
        destructor: Option<Destructor>,
    ) {
        let buffer = match destructor {
            Some(d) => Buffer::with_destructor(data, d),
            None => Buffer::owned(data),
        };
        self.push_audio(Box::new(move |_frame, req| {
            req.buffer = Some(buffer);
            req.format = format;
            req.frequency = frequency;
            req.channels = channels;
            req.samples = samples;
            Ok(())
        }));
    }

    pub fn set_alpha(&self, data: Vec<u8>, destructor: Option<Destructor>) {
        let buffer = match destructor {
            Some(d) => Buffer::with_destructor(data, d),
            None => Buffer::owned(data),
        };
        *self.alpha.lock() = Some(buffer);
    }

    pub fn get_alpha(&self) -> Option<Buffer> {
        self.alpha.lock().clone()
    }

    /// Pops and runs the topmost image closure. An empty stack produces a
    /// blank (all-zero) buffer of the requested size — the synthetic
    /// black frame a blank playlist entry yields.
    pub fn get_image(
        &self,
        want_format: PixelFormat,
        want_width: u32,
        want_height: u32,
        writable: bool,
    ) -> MltResult<ImageResult> {
        let mut request = ImageRequest {
            buffer: None,
            format: want_format,
            width: want_width,
            height: want_height,
            writable,
        };
        match self.pop_get_image() {
            Some(f) => f(self, &mut request)?,
            None => {
                let size = blank_image_size(request.format, request.width, request.height);
                request.buffer = Some(Buffer::owned(vec![0u8; size]));
            }
        }
        Ok(ImageResult {
            buffer: request.buffer,
            format: request.format,
            width: request.width,
            height: request.height,
        })
    }

    /// Pops and runs the topmost audio closure, synthesizing silence on an
    /// empty stack.
    pub fn get_audio(
        &self,
        want_format: AudioFormat,
        want_frequency: u32,
        want_channels: u32,
        want_samples: u32,
    ) -> MltResult<AudioResult> {
        let mut request = AudioRequest {
            buffer: None,
            format: want_format,
            frequency: want_frequency,
            channels: want_channels,
            samples: want_samples,
        };
        match self.pop_audio() {
            Some(f) => f(self, &mut request)?,
            None => {
                let size =
                    request.format.bytes_per_sample() * request.channels as usize * request.samples as usize;
                request.buffer = Some(Buffer::owned(vec![0u8; size]));
            }
        }
        Ok(AudioResult {
            buffer: request.buffer,
            format: request.format,
            frequency: request.frequency,
            channels: request.channels,
            samples: request.samples,
        })
    }

    /// Duplicates the frame's identity and, optionally, its resolved
    /// buffers so the clone can be closed independently of the original.
    pub fn clone_frame(&self, deep_image: bool, deep_audio: bool) -> Self {
        let clone = Frame::with_props(self.props.clone(), self.position);
        if deep_image {
            if let Ok(img) = self.get_image(PixelFormat::Rgb24, 0, 0, false) {
                if let Some(buf) = img.buffer {
                    clone.push_get_image(Box::new(move |_frame, req| {
                        req.buffer = Some(buf);
                        Ok(())
                    }));
                }
            }
        }
        if deep_audio {
            if let Ok(audio) = self.get_audio(AudioFormat::S16, 0, 0, 0) {
                if let Some(buf) = audio.buffer {
                    clone.push_audio(Box::new(move |_frame, req| {
                        req.buffer = Some(buf);
                        Ok(())
                    }));
                }
            }
        }
        clone
    }

    /// Explicit lifecycle close: drops any unresolved stack entries and the
    /// alpha buffer, running their destructors, ahead of `Frame`'s own drop.
    pub fn close(&self) {
        self.image_stack.lock().clear();
        self.audio_stack.lock().clear();
        *self.alpha.lock() = None;
    }
}

fn blank_image_size(format: PixelFormat, width: u32, height: u32) -> usize {
    let pixels = (width as usize) * (height as usize);
    match format {
        PixelFormat::Yuv420p => pixels + pixels / 2,
        PixelFormat::Yuv444p10 => pixels * 2 * 3,
        PixelFormat::Yuv422 => pixels * 2,
        PixelFormat::Opengl | PixelFormat::Movit | PixelFormat::None => 0,
        other => pixels * other.bytes_per_pixel(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stack_yields_blank_buffer_of_requested_size() {
        let frame = Frame::init(0);
        let img = frame
            .get_image(PixelFormat::Rgb24, 4, 2, false)
            .unwrap();
        assert_eq!(img.buffer.unwrap().len(), 4 * 2 * 3);
    }

    #[test]
    fn set_image_is_visible_through_get_image() {
        let frame = Frame::init(5);
        frame.set_image(vec![1, 2, 3], PixelFormat::Rgb24, 1, 1, None);
        let img = frame.get_image(PixelFormat::Rgb24, 1, 1, false).unwrap();
        assert_eq!(img.buffer.unwrap().as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn filter_closure_can_recurse_into_the_frame_for_the_layer_beneath() {
        let frame = Frame::init(0);
        frame.set_image(vec![10, 10, 10], PixelFormat::Rgb24, 1, 1, None);
        frame.push_get_image(Box::new(|inner, req| {
            let below = inner.get_image(req.format, req.width, req.height, false)?;
            let mut bytes = below.buffer.unwrap().as_slice().to_vec();
            for b in &mut bytes {
                *b += 1;
            }
            req.buffer = Some(Buffer::owned(bytes));
            req.format = below.format;
            req.width = below.width;
            req.height = below.height;
            Ok(())
        }));
        let img = frame.get_image(PixelFormat::Rgb24, 1, 1, false).unwrap();
        assert_eq!(img.buffer.unwrap().as_slice(), &[11, 11, 11]);
    }

    #[test]
    fn destructor_runs_once_last_handle_is_dropped() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let flag = Arc::new(AtomicBool::new(false));
        let flag2 = flag.clone();
        let frame = Frame::init(0);
        frame.set_image(
            vec![0; 4],
            PixelFormat::Rgba,
            1,
            1,
            Some(Arc::new(move || flag2.store(true, Ordering::SeqCst))),
        );
        let img = frame.get_image(PixelFormat::Rgba, 1, 1, false).unwrap();
        drop(img);
        assert!(flag.load(Ordering::SeqCst));
    }
}
