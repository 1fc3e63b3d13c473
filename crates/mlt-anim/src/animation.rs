//! `Animation`: a sorted list of keyframes plus the parse and serialize
//! operations for sampling a keyframed value at an arbitrary position.

use crate::keyframe::{Keyframe, KeyframeType};
use crate::value::AnimValue;
use mlt_core::{FrameRate, MltError, MltResult, NumericLocale, TimeFormat};

/// A keyframed property value over frame positions.
///
/// An animation with zero keyframes is constructible but not "valid": it
/// carries no data and every query on it answers with an empty/zero result
/// rather than panicking.
#[derive(Debug, Clone)]
pub struct Animation {
    keyframes: Vec<Keyframe>,
    length: i64,
    fps: FrameRate,
    locale: NumericLocale,
    is_string: bool,
}

impl Animation {
    pub fn new(length: i64, fps: FrameRate, locale: NumericLocale) -> Self {
        Self {
            keyframes: Vec::new(),
            length,
            fps,
            locale,
            is_string: false,
        }
    }

    /// Whether this animation's values are string-typed, which changes the
    /// default keyframe interpolation `serialize` omits a code for.
    pub fn is_string(&self) -> bool {
        self.is_string
    }

    pub fn is_valid(&self) -> bool {
        !self.keyframes.is_empty()
    }

    pub fn length(&self) -> i64 {
        self.length
    }

    pub fn set_length(&mut self, new_length: i64) {
        self.keyframes.retain(|kf| kf.position <= new_length);
        self.length = new_length;
    }

    pub fn key_count(&self) -> usize {
        self.keyframes.len()
    }

    /// i-th keyframe in position order.
    pub fn key_get(&self, index: usize) -> Option<&Keyframe> {
        self.keyframes.get(index)
    }

    /// Position of the i-th keyframe in position order.
    pub fn key_get_frame(&self, index: usize) -> Option<i64> {
        self.keyframes.get(index).map(|k| k.position)
    }

    /// Interpolation type in force *at* `position` — the type recorded on
    /// the keyframe at or immediately before it, `Linear` before the first
    /// keyframe or on an empty animation.
    pub fn keyframe_type(&self, position: i64) -> KeyframeType {
        match self.keyframes.binary_search_by_key(&position, |k| k.position) {
            Ok(idx) => self.keyframes[idx].kind,
            Err(0) => KeyframeType::Linear,
            Err(idx) => self.keyframes[idx - 1].kind,
        }
    }

    pub fn is_key(&self, position: i64) -> bool {
        self.keyframes
            .binary_search_by_key(&position, |k| k.position)
            .is_ok()
    }

    fn insert_sorted(&mut self, kf: Keyframe) {
        match self
            .keyframes
            .binary_search_by_key(&kf.position, |k| k.position)
        {
            Ok(idx) => self.keyframes[idx] = kf,
            Err(idx) => self.keyframes.insert(idx, kf),
        }
    }

    pub fn set_item(&mut self, position: i64, value: AnimValue, kind: KeyframeType) {
        self.insert_sorted(Keyframe {
            position,
            value,
            kind,
        });
    }

    /// Sampled value at `position`: the interpolated value between its
    /// bracketing keyframes, or the nearest keyframe's value outside the
    /// animation's range.
    pub fn get_item(&self, position: i64) -> Option<AnimValue> {
        if self.keyframes.is_empty() {
            return None;
        }
        match self
            .keyframes
            .binary_search_by_key(&position, |k| k.position)
        {
            Ok(idx) => Some(self.keyframes[idx].value.clone()),
            Err(0) => Some(self.keyframes[0].value.clone()),
            Err(idx) if idx >= self.keyframes.len() => {
                Some(self.keyframes[self.keyframes.len() - 1].value.clone())
            }
            Err(idx) => Some(self.interpolate_between(idx - 1, idx, position)),
        }
    }

    fn interpolate_between(&self, lo: usize, hi: usize, position: i64) -> AnimValue {
        let a = &self.keyframes[lo];
        let b = &self.keyframes[hi];
        let span = (b.position - a.position).max(1) as f64;
        let t = (position - a.position) as f64 / span;
        match a.kind {
            KeyframeType::Discrete => a.value.clone(),
            KeyframeType::Linear => a.value.lerp(&b.value, t),
            KeyframeType::Ease(family, mode) => {
                let eased = crate::ease::ease(family, mode, t);
                a.value.lerp(&b.value, eased)
            }
            KeyframeType::SmoothLoose | KeyframeType::SmoothNatural | KeyframeType::SmoothTight => {
                self.catmull_rom(lo, hi, t, a.kind)
            }
        }
    }

    /// Catmull-Rom spline through the neighbors of the bracketing pair.
    /// `SmoothNatural` additionally clamps the segment so the curve never
    /// overshoots its two endpoint values; `SmoothLoose`/`SmoothTight`
    /// permit overshoot with differing tension.
    fn catmull_rom(&self, lo: usize, hi: usize, t: f64, kind: KeyframeType) -> AnimValue {
        let p0 = if lo == 0 {
            self.keyframes[lo].value.clone()
        } else {
            self.keyframes[lo - 1].value.clone()
        };
        let p1 = self.keyframes[lo].value.clone();
        let p2 = self.keyframes[hi].value.clone();
        let p3 = if hi + 1 < self.keyframes.len() {
            self.keyframes[hi + 1].value.clone()
        } else {
            self.keyframes[hi].value.clone()
        };

        let tension = match kind {
            KeyframeType::SmoothTight => 0.25,
            KeyframeType::SmoothLoose => 1.0,
            _ => 0.5,
        };

        let q0 = p0.as_double();
        let q1 = p1.as_double();
        let q2 = p2.as_double();
        let q3 = p3.as_double();

        let t2 = t * t;
        let t3 = t2 * t;
        let m1 = tension * (q2 - q0);
        let m2 = tension * (q3 - q1);

        let mut result = (2.0 * t3 - 3.0 * t2 + 1.0) * q1
            + (t3 - 2.0 * t2 + t) * m1
            + (-2.0 * t3 + 3.0 * t2) * q2
            + (t3 - t2) * m2;

        if matches!(kind, KeyframeType::SmoothNatural) {
            let (min, max) = if q1 <= q2 { (q1, q2) } else { (q2, q1) };
            result = result.clamp(min, max);
        }

        match &p1 {
            AnimValue::Int(_) => AnimValue::Int(result.round() as i64),
            AnimValue::Rect(_) => p1.lerp(&p2, t),
            AnimValue::Color(_) => p1.lerp(&p2, t),
            AnimValue::Str(_) => p1.lerp(&p2, t),
            AnimValue::Double(_) => AnimValue::Double(result),
        }
    }

    /// Alias for `get_item`, matching the "interpolate" vocabulary used
    /// elsewhere in the framework for frame-by-frame evaluation.
    pub fn interpolate(&self, position: i64) -> Option<AnimValue> {
        self.get_item(position)
    }

    pub fn remove(&mut self, position: i64) -> bool {
        match self
            .keyframes
            .binary_search_by_key(&position, |k| k.position)
        {
            Ok(idx) => {
                self.keyframes.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    pub fn next_key(&self, position: i64) -> Option<i64> {
        self.keyframes
            .iter()
            .map(|k| k.position)
            .find(|&p| p > position)
    }

    pub fn previous_key(&self, position: i64) -> Option<i64> {
        self.keyframes
            .iter()
            .rev()
            .map(|k| k.position)
            .find(|&p| p < position)
    }

    pub fn shift_frames(&mut self, delta: i64) {
        for kf in &mut self.keyframes {
            kf.position += delta;
        }
    }

    /// Parse a `ITEM (; ITEM)*` animation string where
    /// `ITEM = [POSITION [INTERP_CODE]] = VALUE`. A bare `VALUE` with no
    /// position is placed at position 0.
    pub fn parse(
        s: &str,
        length: i64,
        fps: FrameRate,
        locale: NumericLocale,
        is_string: bool,
    ) -> MltResult<Self> {
        let mut anim = Self::new(length, fps, locale);
        anim.is_string = is_string;
        for item in s.split(';') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (lhs, rhs) = item
                .split_once('=')
                .ok_or_else(|| MltError::parse(format!("missing '=' in item '{item}'"), -1))?;
            let rhs = rhs.trim();
            let lhs = lhs.trim();

            let (position, code) = if lhs.is_empty() {
                (0, "")
            } else {
                let split_at = lhs
                    .find(|c: char| !(c.is_ascii_digit() || c == '-' || c == '+'))
                    .unwrap_or(lhs.len());
                let (pos_str, code) = lhs.split_at(split_at);
                let pos_str = pos_str.trim();
                let position = if pos_str.is_empty() {
                    0
                } else {
                    mlt_core::time::parse_position(pos_str, fps)
                        .map_err(|_| MltError::parse(format!("bad position '{pos_str}'"), -1))?
                };
                (position, code)
            };

            let kind = if code.is_empty() {
                KeyframeType::default_for(is_string)
            } else {
                KeyframeType::parse_code(code)?
            };
            let value = parse_value(rhs, locale, is_string)?;
            anim.set_item(position, value, kind);
        }
        Ok(anim)
    }

    /// Inverse of `parse`. Keyframe types are only emitted when they differ
    /// from the default for the value's kind, matching the terse grammar
    /// the format favors. `time_format` controls how each keyframe's
    /// position is spelled (frames, clock, or SMPTE).
    pub fn serialize(&self, time_format: TimeFormat) -> String {
        let default_kind = KeyframeType::default_for(self.is_string);
        self.keyframes
            .iter()
            .filter(|kf| kf.position >= 0 && kf.position <= self.length)
            .map(|kf| {
                let code = if kf.kind == default_kind {
                    String::new()
                } else {
                    kf.kind.code()
                };
                let position = mlt_core::time::serialize_position(kf.position, self.fps, time_format);
                format!("{}{}={}", position, code, kf.value.to_string_repr())
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

fn parse_value(raw: &str, locale: NumericLocale, is_string: bool) -> MltResult<AnimValue> {
    if is_string {
        let unquoted = raw
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(raw);
        return Ok(AnimValue::Str(unquoted.to_string()));
    }
    let parts: Vec<&str> = raw.split_whitespace().collect();
    match parts.len() {
        4 => {
            let mut quad = [0.0; 4];
            for (i, p) in parts.iter().enumerate() {
                quad[i] = locale
                    .parse_f64(p)
                    .ok_or_else(|| MltError::parse(format!("bad numeric component '{p}'"), -1))?;
            }
            Ok(AnimValue::Rect(quad))
        }
        1 => {
            if let Ok(i) = raw.parse::<i64>() {
                Ok(AnimValue::Int(i))
            } else {
                let v = locale
                    .parse_f64(raw)
                    .ok_or_else(|| MltError::parse(format!("bad numeric value '{raw}'"), -1))?;
                Ok(AnimValue::Double(v))
            }
        }
        _ => Err(MltError::parse(format!("malformed value '{raw}'"), -1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fps() -> FrameRate {
        FrameRate::new(25, 1)
    }

    #[test]
    fn empty_animation_is_invalid_and_answers_empty() {
        let anim = Animation::new(100, fps(), NumericLocale::default());
        assert!(!anim.is_valid());
        assert_eq!(anim.key_count(), 0);
        assert!(anim.get_item(10).is_none());
        assert_eq!(anim.keyframe_type(10), KeyframeType::Linear);
    }

    #[test]
    fn single_keyframe_answers_constant_value_everywhere() {
        let mut anim = Animation::new(100, fps(), NumericLocale::default());
        anim.set_item(10, AnimValue::Double(5.0), KeyframeType::Linear);
        assert!(anim.is_valid());
        assert_eq!(anim.get_item(0).unwrap().as_double(), 5.0);
        assert_eq!(anim.get_item(10).unwrap().as_double(), 5.0);
        assert_eq!(anim.get_item(99).unwrap().as_double(), 5.0);
        assert!(anim.is_key(10));
        assert!(!anim.is_key(11));
    }

    #[test]
    fn linear_interpolation_between_two_keyframes() {
        let mut anim = Animation::new(100, fps(), NumericLocale::default());
        anim.set_item(0, AnimValue::Double(0.0), KeyframeType::Linear);
        anim.set_item(10, AnimValue::Double(100.0), KeyframeType::Linear);
        let mid = anim.get_item(5).unwrap().as_double();
        assert!((mid - 50.0).abs() < 1e-9);
    }

    #[test]
    fn discrete_holds_previous_value_until_next_keyframe() {
        let mut anim = Animation::new(100, fps(), NumericLocale::default());
        anim.set_item(0, AnimValue::Double(1.0), KeyframeType::Discrete);
        anim.set_item(10, AnimValue::Double(2.0), KeyframeType::Discrete);
        assert_eq!(anim.get_item(5).unwrap().as_double(), 1.0);
        assert_eq!(anim.get_item(10).unwrap().as_double(), 2.0);
    }

    #[test]
    fn parse_roundtrips_through_serialize() {
        let anim = Animation::parse("0=1;10|=2;20~=3", 100, fps(), NumericLocale::default(), false)
            .unwrap();
        assert_eq!(anim.key_count(), 3);
        assert_eq!(anim.keyframe_type(10), KeyframeType::Discrete);
        let s = anim.serialize(TimeFormat::Frames);
        assert_eq!(s, "0=1;10|=2;20~=3");
    }

    #[test]
    fn next_and_previous_key_bracket_a_position() {
        let mut anim = Animation::new(100, fps(), NumericLocale::default());
        anim.set_item(0, AnimValue::Int(0), KeyframeType::Linear);
        anim.set_item(10, AnimValue::Int(1), KeyframeType::Linear);
        anim.set_item(20, AnimValue::Int(2), KeyframeType::Linear);
        assert_eq!(anim.next_key(5), Some(10));
        assert_eq!(anim.previous_key(15), Some(10));
        assert_eq!(anim.next_key(20), None);
    }

    #[test]
    fn shift_frames_moves_every_keyframe() {
        let mut anim = Animation::new(100, fps(), NumericLocale::default());
        anim.set_item(10, AnimValue::Int(1), KeyframeType::Linear);
        anim.shift_frames(5);
        assert_eq!(anim.key_get_frame(0), Some(15));
    }
}
