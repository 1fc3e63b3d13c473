//! Pixel and sample formats a frame's buffers may carry.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    #[default]
    None,
    Rgb24,
    Rgba,
    Rgba64,
    Yuv422,
    Yuv420p,
    Opengl,
    Yuv444p10,
    Movit,
}

impl PixelFormat {
    /// Bytes per pixel for the packed formats; planar formats return `0`
    /// since plane sizes depend on width/height/chroma subsampling rather
    /// than a flat stride.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::None => 0,
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba => 4,
            PixelFormat::Rgba64 => 8,
            PixelFormat::Yuv422 => 2,
            PixelFormat::Yuv420p | PixelFormat::Yuv444p10 => 0,
            PixelFormat::Opengl | PixelFormat::Movit => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioFormat {
    #[default]
    None,
    S16,
    S32,
    Float,
    S32le,
    F32le,
    U8,
}

impl AudioFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            AudioFormat::None => 0,
            AudioFormat::S16 => 2,
            AudioFormat::S32 | AudioFormat::Float | AudioFormat::S32le | AudioFormat::F32le => 4,
            AudioFormat::U8 => 1,
        }
    }
}
