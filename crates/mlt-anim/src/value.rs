//! Value types an animation curve can carry.

use serde::{Deserialize, Serialize};

/// A keyframeable value. `Rect`/`Color` interpolate component-wise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnimValue {
    Int(i64),
    Double(f64),
    Rect([f64; 4]),
    Color([f64; 4]),
    Str(String),
}

impl AnimValue {
    pub fn as_double(&self) -> f64 {
        match self {
            AnimValue::Int(v) => *v as f64,
            AnimValue::Double(v) => *v,
            AnimValue::Rect(r) | AnimValue::Color(r) => r[0],
            AnimValue::Str(s) => s.parse().unwrap_or(0.0),
        }
    }

    pub fn as_int(&self) -> i64 {
        match self {
            AnimValue::Int(v) => *v,
            AnimValue::Double(v) => v.round() as i64,
            AnimValue::Rect(r) | AnimValue::Color(r) => r[0].round() as i64,
            AnimValue::Str(s) => s.parse().unwrap_or(0),
        }
    }

    pub fn as_quad(&self) -> [f64; 4] {
        match self {
            AnimValue::Int(v) => [*v as f64; 4],
            AnimValue::Double(v) => [*v; 4],
            AnimValue::Rect(r) | AnimValue::Color(r) => *r,
            AnimValue::Str(_) => [0.0; 4],
        }
    }

    /// Component-wise linear blend between two values of possibly-different
    /// representations; the result inherits `self`'s representation. String
    /// values never truly interpolate (they are always paired with a
    /// `Discrete` keyframe type) and simply hold at `self` until `t` reaches
    /// the far endpoint.
    pub fn lerp(&self, other: &AnimValue, t: f64) -> AnimValue {
        match (self, other) {
            (AnimValue::Str(_), _) => {
                if t >= 1.0 {
                    other.clone()
                } else {
                    self.clone()
                }
            }
            (AnimValue::Int(_), _) => {
                AnimValue::Int((self.as_double() + t * (other.as_double() - self.as_double())).round() as i64)
            }
            (AnimValue::Rect(_), _) => {
                let a = self.as_quad();
                let b = other.as_quad();
                let mut out = [0.0; 4];
                for i in 0..4 {
                    out[i] = a[i] + t * (b[i] - a[i]);
                }
                AnimValue::Rect(out)
            }
            (AnimValue::Color(_), _) => {
                let a = self.as_quad();
                let b = other.as_quad();
                let mut out = [0.0; 4];
                for i in 0..4 {
                    out[i] = a[i] + t * (b[i] - a[i]);
                }
                AnimValue::Color(out)
            }
            _ => AnimValue::Double(self.as_double() + t * (other.as_double() - self.as_double())),
        }
    }

    pub fn to_string_repr(&self) -> String {
        match self {
            AnimValue::Int(v) => v.to_string(),
            AnimValue::Double(v) => format!("{v}"),
            AnimValue::Rect(r) | AnimValue::Color(r) => {
                format!("{} {} {} {}", r[0], r[1], r[2], r[3])
            }
            AnimValue::Str(s) => s.clone(),
        }
    }
}
