//! The 30 ease interpolation variants, grouped by easing family.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EaseFamily {
    Sinusoidal,
    Quadratic,
    Cubic,
    Quartic,
    Quintic,
    Exponential,
    Circular,
    Back,
    Elastic,
    Bounce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EaseMode {
    In,
    Out,
    InOut,
}

/// Evaluate `e(t)` for `t` in `[0, 1]`. Back/elastic/bounce may return values
/// outside `[0, 1]` by design (overshoot).
pub fn ease(family: EaseFamily, mode: EaseMode, t: f64) -> f64 {
    use EaseFamily::*;
    use EaseMode::*;
    match (family, mode) {
        (Sinusoidal, In) => 1.0 - (t * PI / 2.0).cos(),
        (Sinusoidal, Out) => (t * PI / 2.0).sin(),
        (Sinusoidal, InOut) => -((PI * t).cos() - 1.0) / 2.0,

        (Quadratic, In) => t * t,
        (Quadratic, Out) => 1.0 - (1.0 - t) * (1.0 - t),
        (Quadratic, InOut) => {
            if t < 0.5 {
                2.0 * t * t
            } else {
                1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
            }
        }

        (Cubic, In) => t.powi(3),
        (Cubic, Out) => 1.0 - (1.0 - t).powi(3),
        (Cubic, InOut) => {
            if t < 0.5 {
                4.0 * t.powi(3)
            } else {
                1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
            }
        }

        (Quartic, In) => t.powi(4),
        (Quartic, Out) => 1.0 - (1.0 - t).powi(4),
        (Quartic, InOut) => {
            if t < 0.5 {
                8.0 * t.powi(4)
            } else {
                1.0 - (-2.0 * t + 2.0).powi(4) / 2.0
            }
        }

        (Quintic, In) => t.powi(5),
        (Quintic, Out) => 1.0 - (1.0 - t).powi(5),
        (Quintic, InOut) => {
            if t < 0.5 {
                16.0 * t.powi(5)
            } else {
                1.0 - (-2.0 * t + 2.0).powi(5) / 2.0
            }
        }

        (Exponential, In) => {
            if t <= 0.0 { 0.0 } else { 2f64.powf(10.0 * t - 10.0) }
        }
        (Exponential, Out) => {
            if t >= 1.0 { 1.0 } else { 1.0 - 2f64.powf(-10.0 * t) }
        }
        (Exponential, InOut) => {
            if t <= 0.0 {
                0.0
            } else if t >= 1.0 {
                1.0
            } else if t < 0.5 {
                2f64.powf(20.0 * t - 10.0) / 2.0
            } else {
                (2.0 - 2f64.powf(-20.0 * t + 10.0)) / 2.0
            }
        }

        (Circular, In) => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
        (Circular, Out) => (1.0 - (t - 1.0).powi(2)).max(0.0).sqrt(),
        (Circular, InOut) => {
            if t < 0.5 {
                (1.0 - (1.0 - (2.0 * t).powi(2)).max(0.0).sqrt()) / 2.0
            } else {
                ((1.0 - (-2.0 * t + 2.0).powi(2)).max(0.0).sqrt() + 1.0) / 2.0
            }
        }

        (Back, In) => {
            const C1: f64 = 1.70158;
            const C3: f64 = C1 + 1.0;
            C3 * t.powi(3) - C1 * t.powi(2)
        }
        (Back, Out) => {
            const C1: f64 = 1.70158;
            const C3: f64 = C1 + 1.0;
            1.0 + C3 * (t - 1.0).powi(3) + C1 * (t - 1.0).powi(2)
        }
        (Back, InOut) => {
            const C1: f64 = 1.70158;
            const C2: f64 = C1 * 1.525;
            if t < 0.5 {
                ((2.0 * t).powi(2) * ((C2 + 1.0) * 2.0 * t - C2)) / 2.0
            } else {
                ((2.0 * t - 2.0).powi(2) * ((C2 + 1.0) * (2.0 * t - 2.0) + C2) + 2.0) / 2.0
            }
        }

        (Elastic, In) => {
            const C4: f64 = 2.0 * PI / 3.0;
            if t <= 0.0 {
                0.0
            } else if t >= 1.0 {
                1.0
            } else {
                -(2f64.powf(10.0 * t - 10.0)) * ((t * 10.0 - 10.75) * C4).sin()
            }
        }
        (Elastic, Out) => {
            const C4: f64 = 2.0 * PI / 3.0;
            if t <= 0.0 {
                0.0
            } else if t >= 1.0 {
                1.0
            } else {
                2f64.powf(-10.0 * t) * ((t * 10.0 - 0.75) * C4).sin() + 1.0
            }
        }
        (Elastic, InOut) => {
            const C5: f64 = 2.0 * PI / 4.5;
            if t <= 0.0 {
                0.0
            } else if t >= 1.0 {
                1.0
            } else if t < 0.5 {
                -(2f64.powf(20.0 * t - 10.0) * ((20.0 * t - 11.125) * C5).sin()) / 2.0
            } else {
                (2f64.powf(-20.0 * t + 10.0) * ((20.0 * t - 11.125) * C5).sin()) / 2.0 + 1.0
            }
        }

        (Bounce, Out) => bounce_out(t),
        (Bounce, In) => 1.0 - bounce_out(1.0 - t),
        (Bounce, InOut) => {
            if t < 0.5 {
                (1.0 - bounce_out(1.0 - 2.0 * t)) / 2.0
            } else {
                (1.0 + bounce_out(2.0 * t - 1.0)) / 2.0
            }
        }
    }
}

fn bounce_out(t: f64) -> f64 {
    const N1: f64 = 7.5625;
    const D1: f64 = 2.75;
    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984375
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_zero_and_one_for_most_families() {
        for family in [
            EaseFamily::Sinusoidal,
            EaseFamily::Quadratic,
            EaseFamily::Cubic,
            EaseFamily::Quartic,
            EaseFamily::Quintic,
            EaseFamily::Exponential,
            EaseFamily::Circular,
        ] {
            for mode in [EaseMode::In, EaseMode::Out, EaseMode::InOut] {
                let start = ease(family, mode, 0.0);
                let end = ease(family, mode, 1.0);
                assert!((start - 0.0).abs() < 1e-9, "{family:?} {mode:?} start={start}");
                assert!((end - 1.0).abs() < 1e-9, "{family:?} {mode:?} end={end}");
            }
        }
    }

    #[test]
    fn back_overshoots() {
        let v = ease(EaseFamily::Back, EaseMode::Out, 0.9);
        assert!(v > 1.0);
    }

    #[test]
    fn bounce_out_reaches_one_at_end() {
        assert!((ease(EaseFamily::Bounce, EaseMode::Out, 1.0) - 1.0).abs() < 1e-9);
    }
}
