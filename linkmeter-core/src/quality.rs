use crate::{defaults, measure::LossPercentage};
use serde::Serialize;
use std::fmt;

/// Categorical verdict on a link, from its loss percentage.
///
/// | loss | verdict |
/// |---|---|
/// | `< 5%` | [`LinkQuality::Excellent`] |
/// | `5% ..< 20%` | [`LinkQuality::Acceptable`] |
/// | `>= 20%` | [`LinkQuality::Critical`] |
///
/// ```
/// # use linkmeter_core::{LinkQuality, measure::LossPercentage};
/// let loss = LossPercentage::from_counts(5, 100);
/// assert_eq!(LinkQuality::classify(loss), LinkQuality::Acceptable);
/// assert_eq!(LinkQuality::classify(loss).to_string(), "acceptable");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkQuality {
    Excellent,
    Acceptable,
    Critical,
}

impl LinkQuality {
    pub fn classify(loss: LossPercentage) -> Self {
        let loss = loss.value();
        if loss < defaults::EXCELLENT_LOSS_LIMIT {
            Self::Excellent
        } else if loss < defaults::ACCEPTABLE_LOSS_LIMIT {
            Self::Acceptable
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Acceptable => "acceptable",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for LinkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
