//! Percentage ratios with an explicit undefined state.

use serde::{Serialize, Serializer};

/// A percentage of a zone's housing stock.
///
/// Division by a zero or missing denominator produces [`Ratio::Undefined`]
/// instead of `NaN` or `0`, so an undefined value can never be mistaken for
/// a small number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ratio {
    /// A finite percentage. Not capped at 100.
    Defined(f64),
    /// The denominator was zero or absent.
    Undefined,
}

impl Ratio {
    /// Computes `100 * numerator / denominator`.
    #[must_use]
    pub fn percent(numerator: f64, denominator: Option<f64>) -> Self {
        match denominator {
            Some(d) if d > 0.0 && d.is_finite() && numerator.is_finite() => {
                Self::Defined(100.0 * numerator / d)
            }
            _ => Self::Undefined,
        }
    }

    /// Sums ratios. Any undefined term makes the sum undefined; an empty
    /// sum is undefined as well.
    #[must_use]
    pub fn sum<I: IntoIterator<Item = Self>>(ratios: I) -> Self {
        let mut total: Option<f64> = None;
        for ratio in ratios {
            match ratio {
                Self::Defined(v) => *total.get_or_insert(0.0) += v,
                Self::Undefined => return Self::Undefined,
            }
        }
        total.map_or(Self::Undefined, Self::Defined)
    }

    /// Returns the percentage if defined.
    #[must_use]
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Defined(v) => Some(v),
            Self::Undefined => None,
        }
    }

    /// Whether this ratio holds a finite value.
    #[must_use]
    pub fn is_defined(self) -> bool {
        self.value().is_some_and(f64::is_finite)
    }
}

impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value() {
            Some(v) if v.is_finite() => serializer.serialize_f64(v),
            _ => serializer.serialize_none(),
        }
    }
}
