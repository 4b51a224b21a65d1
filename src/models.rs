//! Core data types that flow between the pipeline stages.

use std::fmt;

/// Sitemap `<priority>` value, a decimal in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Priority(f64);

impl Priority {
    pub const DEFAULT: Priority = Priority(0.3);

    /// `None` unless `value` is finite and within `[0.0, 1.0]`.
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(Priority(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::DEFAULT
    }
}

/// Decimal rendering with at least one fractional digit: `0.3`, `1.0`, `0.75`.
impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 {
            write!(f, "{:.1}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// One `<url>` of a sitemap.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressEntry {
    /// Trimmed, non-empty address text.
    pub loc: String,
    pub priority: Priority,
}

/// One `<sitemap>` of the sitemap index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub loc: String,
}
