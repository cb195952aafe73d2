use serde::Serialize;
use std::fmt;

/// Share of the transmitted packets that were lost, as a percentage.
///
/// # Example
///
/// ```
/// use linkmeter_core::measure::LossPercentage;
///
/// let loss = LossPercentage::from_counts(5, 100);
/// assert_eq!(loss.to_string(), "5%");
///
/// // nothing transmitted, nothing lost
/// assert_eq!(LossPercentage::from_counts(0, 0), LossPercentage::ZERO);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct LossPercentage(f64);

impl LossPercentage {
    pub const ZERO: Self = Self(0.0);

    /// Create a validated percentage.
    ///
    /// # Errors
    ///
    /// Returns an error if `percent` is NaN, infinite or negative. Values
    /// above `100` are accepted: engines may report more lost packets than
    /// they attribute to a flow's transmissions.
    pub fn new(percent: f64) -> Result<Self, LossPercentageError> {
        if !percent.is_finite() || percent < 0.0 {
            return Err(LossPercentageError(percent));
        }
        Ok(Self(percent))
    }

    /// `100 * lost / transmitted`, defined as `0` when nothing was
    /// transmitted.
    pub fn from_counts(lost: u64, transmitted: u64) -> Self {
        if transmitted == 0 {
            return Self::ZERO;
        }
        Self(lost as f64 * 100.0 / transmitted as f64)
    }

    /// Returns the inner `f64` value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for LossPercentage {
    /// Formats as a percentage with up to 2 decimal places.
    ///
    /// - `5.0` → `"5%"`
    /// - `12.3` → `"12.30%"`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 {
            write!(f, "{}%", self.0 as u64)
        } else {
            write!(f, "{:.2}%", self.0)
        }
    }
}

/// Error returned when constructing a [`LossPercentage`] from a value that
/// is not a non-negative number.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("loss percentage must be a finite, non-negative number, got {0}")]
pub struct LossPercentageError(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_counts() {
        assert_eq!(LossPercentage::from_counts(5, 100).value(), 5.0);
        assert_eq!(LossPercentage::from_counts(0, 50).value(), 0.0);
        assert_eq!(LossPercentage::from_counts(50, 50).value(), 100.0);
    }

    #[test]
    fn no_transmission_is_no_loss() {
        assert_eq!(LossPercentage::from_counts(0, 0), LossPercentage::ZERO);
        assert_eq!(LossPercentage::from_counts(3, 0), LossPercentage::ZERO);
    }

    #[test]
    fn display() {
        assert_eq!(LossPercentage::ZERO.to_string(), "0%");
        assert_eq!(LossPercentage::from_counts(5, 100).to_string(), "5%");
        assert_eq!(LossPercentage::new(12.3).unwrap().to_string(), "12.30%");
    }

    #[test]
    fn reject_invalid() {
        assert!(LossPercentage::new(f64::NAN).is_err());
        assert!(LossPercentage::new(-0.1).is_err());
        assert!(LossPercentage::new(f64::INFINITY).is_err());
        assert!(LossPercentage::new(0.0).is_ok());
        assert!(LossPercentage::new(120.0).is_ok());
    }
}
