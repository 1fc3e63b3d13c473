//! Per-bag numeric locale, independent of the process locale.
//!
//! Animation and property parsing must not depend on the process's locale:
//! a bag carries its own decimal separator so double-valued properties
//! serialize portably regardless of where the process runs.

use serde::{Deserialize, Serialize};

/// A minimal numeric locale: only the decimal separator matters for the
/// grammars this framework parses (animation, time, plain doubles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericLocale {
    decimal_point: char,
}

impl NumericLocale {
    /// The portable default used when a bag has not been given a locale.
    /// Matches `LC_NUMERIC=C`.
    pub const C: Self = Self { decimal_point: '.' };

    pub fn new(decimal_point: char) -> Self {
        Self { decimal_point }
    }

    pub fn decimal_point(&self) -> char {
        self.decimal_point
    }

    /// Parse a double using this locale's decimal separator.
    pub fn parse_f64(&self, s: &str) -> Option<f64> {
        let s = s.trim();
        if self.decimal_point == '.' {
            s.parse::<f64>().ok()
        } else {
            let normalized: String = s
                .chars()
                .map(|c| if c == self.decimal_point { '.' } else { c })
                .collect();
            normalized.parse::<f64>().ok()
        }
    }

    /// Format a double using this locale's decimal separator.
    pub fn format_f64(&self, value: f64) -> String {
        let s = format!("{value}");
        if self.decimal_point == '.' {
            s
        } else {
            s.replace('.', &self.decimal_point.to_string())
        }
    }

    /// The `LC_NUMERIC` tag this locale corresponds to, for XML/YAML emission.
    pub fn lc_numeric_tag(&self) -> &'static str {
        if self.decimal_point == '.' { "C" } else { "POSIX" }
    }
}

impl Default for NumericLocale {
    fn default() -> Self {
        Self::C
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parses_dot_decimal() {
        let locale = NumericLocale::default();
        assert_eq!(locale.parse_f64("3.25"), Some(3.25));
    }

    #[test]
    fn comma_locale_parses_and_formats() {
        let locale = NumericLocale::new(',');
        assert_eq!(locale.parse_f64("3,25"), Some(3.25));
        assert_eq!(locale.format_f64(3.25), "3,25");
    }
}
