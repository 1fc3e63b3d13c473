//! Keyframe interpolation types and the single-character grammar codes used
//! to spell them inside a serialized animation string.

use crate::ease::{EaseFamily, EaseMode};
use mlt_core::MltError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyframeType {
    Discrete,
    Linear,
    SmoothLoose,
    SmoothNatural,
    SmoothTight,
    Ease(EaseFamily, EaseMode),
}

impl KeyframeType {
    /// `true` for string-valued keyframes, which default to discrete rather
    /// than linear.
    pub fn default_for(is_string: bool) -> Self {
        if is_string {
            KeyframeType::Discrete
        } else {
            KeyframeType::Linear
        }
    }

    pub fn code(&self) -> String {
        match self {
            KeyframeType::Discrete => "|".to_string(),
            KeyframeType::Linear => String::new(),
            KeyframeType::SmoothLoose => "~".to_string(),
            KeyframeType::SmoothNatural => "$".to_string(),
            KeyframeType::SmoothTight => "-".to_string(),
            KeyframeType::Ease(family, mode) => ease_code(*family, *mode).to_string(),
        }
    }

    pub fn parse_code(code: &str) -> Result<Self, MltError> {
        match code {
            "" => Ok(KeyframeType::Linear),
            "|" => Ok(KeyframeType::Discrete),
            "~" => Ok(KeyframeType::SmoothLoose),
            "$" => Ok(KeyframeType::SmoothNatural),
            "-" => Ok(KeyframeType::SmoothTight),
            single if single.len() == 1 => {
                let c = single.chars().next().unwrap();
                ease_from_code(c)
                    .ok_or_else(|| MltError::parse(format!("unknown keyframe code '{c}'"), -1))
            }
            other => Err(MltError::parse(
                format!("unknown keyframe code '{other}'"),
                -1,
            )),
        }
    }
}

/// The 30 ease codes run `a`..`x` for the first eight families (three codes
/// each, In/Out/InOut in that order), then `y`,`z`,`A` for elastic and
/// `B`,`C`,`D` for bounce.
const EASE_FAMILY_ORDER: [EaseFamily; 10] = [
    EaseFamily::Sinusoidal,
    EaseFamily::Quadratic,
    EaseFamily::Cubic,
    EaseFamily::Quartic,
    EaseFamily::Quintic,
    EaseFamily::Exponential,
    EaseFamily::Circular,
    EaseFamily::Back,
    EaseFamily::Elastic,
    EaseFamily::Bounce,
];

fn ease_alphabet() -> Vec<char> {
    let mut out: Vec<char> = ('a'..='z').collect();
    out.extend(['A', 'B', 'C', 'D']);
    out
}

fn ease_code(family: EaseFamily, mode: EaseMode) -> char {
    let family_index = EASE_FAMILY_ORDER.iter().position(|f| *f == family).unwrap();
    let mode_index = match mode {
        EaseMode::In => 0,
        EaseMode::Out => 1,
        EaseMode::InOut => 2,
    };
    let alphabet = ease_alphabet();
    alphabet[family_index * 3 + mode_index]
}

fn ease_from_code(c: char) -> Option<KeyframeType> {
    let alphabet = ease_alphabet();
    let index = alphabet.iter().position(|&a| a == c)?;
    let family = EASE_FAMILY_ORDER[index / 3];
    let mode = match index % 3 {
        0 => EaseMode::In,
        1 => EaseMode::Out,
        _ => EaseMode::InOut,
    };
    Some(KeyframeType::Ease(family, mode))
}

/// A single point on an animation curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub position: i64,
    pub value: crate::value::AnimValue,
    pub kind: KeyframeType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trips_for_every_ease_variant() {
        for family in EASE_FAMILY_ORDER {
            for mode in [EaseMode::In, EaseMode::Out, EaseMode::InOut] {
                let kind = KeyframeType::Ease(family, mode);
                let code = kind.code();
                let parsed = KeyframeType::parse_code(&code).unwrap();
                assert_eq!(parsed, kind);
            }
        }
    }

    #[test]
    fn empty_code_is_linear_and_pipe_is_discrete() {
        assert_eq!(KeyframeType::parse_code("").unwrap(), KeyframeType::Linear);
        assert_eq!(
            KeyframeType::parse_code("|").unwrap(),
            KeyframeType::Discrete
        );
    }

    #[test]
    fn smooth_natural_uses_dollar_code() {
        assert_eq!(KeyframeType::SmoothNatural.code(), "$");
        assert_eq!(
            KeyframeType::parse_code("$").unwrap(),
            KeyframeType::SmoothNatural
        );
        assert_eq!(
            KeyframeType::parse_code("~").unwrap(),
            KeyframeType::SmoothLoose
        );
    }
}
