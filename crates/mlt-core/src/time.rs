//! Position/time parsing and serialization: frames, clock, and SMPTE timecode.
//!
//! A position can be written as a bare frame count, `HH:MM:SS.mmm` clock
//! time, `HH:MM:SS:ff` non-drop-frame SMPTE, or `HH:MM:SS;ff` drop-frame
//! SMPTE.

use crate::error::MltError;
use crate::locale::NumericLocale;
use serde::{Deserialize, Serialize};

/// A video frame rate expressed as a rational, the way a profile stores it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub fn fps(&self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }

    /// Nearest integer frame rate, used for timecode rollover arithmetic.
    pub fn rounded(&self) -> i64 {
        self.fps().round() as i64
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::new(25, 1)
    }
}

/// Output format for serializing a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFormat {
    Frames,
    Clock,
    SmpteNdf,
    SmpteDf,
}

/// Parse a position string in any of the accepted grammars, returning a
/// zero-based frame index. Bare integers are frames; everything else is
/// resolved against `fps`.
pub fn parse_position(s: &str, fps: FrameRate) -> Result<i64, MltError> {
    let s = s.trim();
    if let Ok(frames) = s.parse::<i64>() {
        return Ok(frames);
    }
    if let Some(rest) = s.strip_prefix('-') {
        return parse_position_unsigned(rest, fps).map(|v| -v);
    }
    parse_position_unsigned(s, fps)
}

fn parse_position_unsigned(s: &str, fps: FrameRate) -> Result<i64, MltError> {
    // HH:MM:SS;ff (drop-frame) or HH:MM:SS:ff (non-drop-frame)
    if let Some((hms, ff, drop)) = split_smpte(s) {
        let (h, m, sec) = split_hms(hms)?;
        let frame_num: i64 = ff
            .parse()
            .map_err(|_| MltError::parse(format!("bad SMPTE frame field: {s}"), -1))?;
        let fps_round = fps.rounded().max(1);
        let total_minutes = h * 60 + m;
        let mut frame_count = fps_round * (h * 3600 + m * 60 + sec) + frame_num;
        if drop {
            let drop_per_min = ((fps_round as f64) * 2.0 / 30.0).round() as i64;
            frame_count -= drop_per_min * (total_minutes - total_minutes / 10);
        }
        return Ok(frame_count);
    }
    // HH:MM:SS.mmm clock time
    if s.contains(':') {
        let (hms, frac) = match s.split_once('.') {
            Some((a, b)) => (a, Some(b)),
            None => (s, None),
        };
        let (h, m, sec) = split_hms(hms)?;
        let mut seconds = (h * 3600 + m * 60 + sec) as f64;
        if let Some(frac) = frac {
            let millis: f64 = format!("0.{frac}")
                .parse()
                .map_err(|_| MltError::parse(format!("bad fractional seconds: {s}"), -1))?;
            seconds += millis;
        }
        return Ok((seconds * fps.fps()).round() as i64);
    }
    Err(MltError::parse(format!("unrecognized position: {s}"), 0))
}

fn split_smpte(s: &str) -> Option<(&str, &str, bool)> {
    if let Some(idx) = s.rfind(';') {
        return Some((&s[..idx], &s[idx + 1..], true));
    }
    // HH:MM:SS:ff has four colon-separated fields.
    if s.matches(':').count() == 3 {
        let idx = s.rfind(':').unwrap();
        return Some((&s[..idx], &s[idx + 1..], false));
    }
    None
}

fn split_hms(s: &str) -> Result<(i64, i64, i64), MltError> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return Err(MltError::parse(format!("expected HH:MM:SS, got {s}"), 0));
    }
    let h: i64 = parts[0]
        .parse()
        .map_err(|_| MltError::parse(format!("bad hours: {s}"), 0))?;
    let m: i64 = parts[1]
        .parse()
        .map_err(|_| MltError::parse(format!("bad minutes: {s}"), 0))?;
    let sec: i64 = parts[2]
        .parse()
        .map_err(|_| MltError::parse(format!("bad seconds: {s}"), 0))?;
    Ok((h, m, sec))
}

/// Serialize a frame position using the given time format.
pub fn serialize_position(frames: i64, fps: FrameRate, format: TimeFormat) -> String {
    match format {
        TimeFormat::Frames => frames.to_string(),
        TimeFormat::Clock => {
            let total_seconds = frames as f64 / fps.fps().max(f64::MIN_POSITIVE);
            let h = (total_seconds / 3600.0) as i64;
            let m = ((total_seconds / 60.0) as i64) % 60;
            let s = total_seconds as i64 % 60;
            let ms = ((total_seconds - total_seconds.floor()) * 1000.0).round() as i64;
            format!("{h:02}:{m:02}:{s:02}.{ms:03}")
        }
        TimeFormat::SmpteNdf | TimeFormat::SmpteDf => {
            let fps_round = fps.rounded().max(1);
            let drop = format == TimeFormat::SmpteDf;
            let mut remaining = frames;
            if drop {
                let drop_per_min = ((fps_round as f64) * 2.0 / 30.0).round() as i64;
                // Invert the drop-frame adjustment iteratively; drop-frame
                // counts are small enough that a closed form isn't needed
                // for the position ranges this framework handles.
                let approx_minutes = remaining / (fps_round * 60);
                remaining += drop_per_min * (approx_minutes - approx_minutes / 10);
            }
            let total_frames_per_sec = fps_round;
            let sec_total = remaining / total_frames_per_sec;
            let ff = remaining % total_frames_per_sec;
            let h = sec_total / 3600;
            let m = (sec_total / 60) % 60;
            let s = sec_total % 60;
            let sep = if drop { ';' } else { ':' };
            format!("{h:02}:{m:02}:{s:02}{sep}{ff:02}")
        }
    }
}

/// Parse a plain double using a bag's numeric locale.
pub fn parse_locale_f64(s: &str, locale: NumericLocale) -> Option<f64> {
    locale.parse_f64(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FPS25: FrameRate = FrameRate::new(25, 1);

    #[test]
    fn bare_frames_parse_as_frames() {
        assert_eq!(parse_position("50", FPS25).unwrap(), 50);
        assert_eq!(parse_position("-3", FPS25).unwrap(), -3);
    }

    #[test]
    fn clock_time_round_trips() {
        let frames = parse_position("00:00:02.000", FPS25).unwrap();
        assert_eq!(frames, 50);
        assert_eq!(
            serialize_position(50, FPS25, TimeFormat::Clock),
            "00:00:02.000"
        );
    }

    #[test]
    fn smpte_ndf_parses() {
        let frames = parse_position("00:00:02:00", FPS25).unwrap();
        assert_eq!(frames, 50);
        assert_eq!(
            serialize_position(50, FPS25, TimeFormat::SmpteNdf),
            "00:00:02:00"
        );
    }

    #[test]
    fn smpte_df_is_distinguished_by_semicolon() {
        let frames = parse_position("00:00:02;00", FPS25).unwrap();
        assert_eq!(frames, 50);
    }
}
