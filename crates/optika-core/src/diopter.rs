//! # Diopter Module
//!
//! Fixed-point optical power values (sphere, cylinder, addition).
//!
//! ## Why Fixed Point?
//! Optical powers are quoted in 0.25-diopter steps and compared for exact
//! equality when looking a combination up in a grade archive. Floating point
//! would make `-0.50 == -0.50` a hazard; an integer count of hundredths makes
//! it trivial. The two-decimal string form ("−0.50" without the typographic
//! minus: "-0.50") is the canonical archive representation.
//!
//! ## Usage
//! ```rust
//! use optika_core::diopter::Diopter;
//!
//! let sph = Diopter::parse("-2.25").unwrap();
//! assert_eq!(sph.hundredths(), -225);
//! assert_eq!(sph.to_string(), "-2.25");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// An optical power in hundredths of a diopter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct Diopter(i32);

impl Diopter {
    /// Creates a diopter value from hundredths (`-50` → -0.50 D).
    #[inline]
    pub const fn from_hundredths(hundredths: i32) -> Self {
        Diopter(hundredths)
    }

    /// Returns the value in hundredths of a diopter.
    #[inline]
    pub const fn hundredths(&self) -> i32 {
        self.0
    }

    /// Parses a fixed two-decimal string ("-0.50", "2.00", "1.5") into a
    /// diopter value. More than two fractional digits is rejected.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        let invalid = || ValidationError::InvalidDiopter {
            value: input.to_string(),
        };

        if s.is_empty() {
            return Err(invalid());
        }

        let (sign, digits) = match s.strip_prefix('-') {
            Some(rest) => (-1i32, rest),
            None => (1i32, s),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() || frac.len() > 2 {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i32 = whole.parse().map_err(|_| invalid())?;
        let frac_hundredths = match frac.len() {
            0 => 0,
            1 => frac.parse::<i32>().map_err(|_| invalid())? * 10,
            _ => frac.parse::<i32>().map_err(|_| invalid())?,
        };

        Ok(Diopter(sign * (whole * 100 + frac_hundredths)))
    }

    /// Ascending inclusive range: `min, min+step, ..., max`.
    ///
    /// Caller guarantees `step > 0` and `min <= max`; grade generation
    /// validates ranges before iterating.
    pub fn steps_asc(min: Diopter, max: Diopter, step: Diopter) -> Vec<Diopter> {
        let mut out = Vec::new();
        let mut current = min.0;
        while current <= max.0 {
            out.push(Diopter(current));
            current += step.0;
        }
        out
    }

    /// Descending inclusive range: `hi, hi-step, ..., lo`.
    ///
    /// Cylinder axes iterate this way: values are conventionally negative and
    /// the maximum (numerically closest to zero) comes first.
    pub fn steps_desc(hi: Diopter, lo: Diopter, step: Diopter) -> Vec<Diopter> {
        let mut out = Vec::new();
        let mut current = hi.0;
        while current >= lo.0 {
            out.push(Diopter(current));
            current -= step.0;
        }
        out
    }
}

/// Canonical two-decimal form, exactly as stored in grade archives.
impl fmt::Display for Diopter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.0.abs() / 100, self.0.abs() % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
