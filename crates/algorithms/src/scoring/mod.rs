//! Regression scores for model evaluation.
//!
//! Scores compare ground truth against predictions and return one scalar.
//! Some are maximised (R² via Pearson), others minimised (MAPE); a
//! model-selection loop that always maximises should rank models by
//! [`Scorer::signed_score`], which flips the sign of minimised scores.
//!
//! # Available Scores
//!
//! - [`R2Pearson`]: squared Pearson correlation, higher is better
//! - [`Mape`]: mean absolute percentage error, lower is better

mod regression;

pub use regression::{mape, r2_pearson, Mape, R2Pearson};

use geoagg_core::{Error, Result};

// =============================================================================
// Direction
// =============================================================================

/// Whether a score should be maximised or minimised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Maximize,
    Minimize,
}

impl Direction {
    pub fn higher_is_better(self) -> bool {
        matches!(self, Direction::Maximize)
    }
}

// =============================================================================
// Scorer Trait
// =============================================================================

/// A scalar evaluation score over paired ground truth and predictions.
pub trait Scorer: Send + Sync {
    /// Compute the raw score.
    ///
    /// # Errors
    /// [`Error::LengthMismatch`] when the inputs differ in length and
    /// [`Error::InvalidParameter`] when they are empty.
    fn score(&self, y_true: &[f64], y_pred: &[f64]) -> Result<f64>;

    /// Optimisation direction of [`Scorer::score`].
    fn direction(&self) -> Direction;

    /// Short lowercase identifier.
    fn name(&self) -> &'static str;

    /// Score oriented so that greater is always better.
    fn signed_score(&self, y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
        let value = self.score(y_true, y_pred)?;
        Ok(match self.direction() {
            Direction::Maximize => value,
            Direction::Minimize => -value,
        })
    }
}

/// Look up a scorer by name (`r2` / `r2_pearson`, `mape`).
pub fn scorer_by_name(name: &str) -> Result<Box<dyn Scorer>> {
    match name.to_ascii_lowercase().as_str() {
        "r2" | "r2_pearson" => Ok(Box::new(R2Pearson)),
        "mape" => Ok(Box::new(Mape)),
        _ => Err(Error::InvalidParameter {
            name: "scorer",
            value: name.to_string(),
            reason: "expected one of r2, r2_pearson, mape".to_string(),
        }),
    }
}

pub(crate) fn check_pair(y_true: &[f64], y_pred: &[f64]) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(Error::LengthMismatch {
            expected: y_true.len(),
            actual: y_pred.len(),
        });
    }
    if y_true.is_empty() {
        return Err(Error::InvalidParameter {
            name: "y_true",
            value: "[]".to_string(),
            reason: "at least one sample is required".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_signed_score_flips_minimised() {
        let y = [1.0, 2.0, 0.0];
        let yhat = [1.0, 1.0, 5.0];
        assert_relative_eq!(Mape.signed_score(&y, &yhat).unwrap(), -1.0 / 6.0, epsilon = 1e-12);

        let y = [1.0, 2.0, 3.0];
        let yhat = [2.0, 4.0, 6.0];
        assert_relative_eq!(R2Pearson.signed_score(&y, &yhat).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_directions() {
        assert!(R2Pearson.direction().higher_is_better());
        assert!(!Mape.direction().higher_is_better());
    }

    #[test]
    fn test_scorer_by_name() {
        assert_eq!(scorer_by_name("R2").unwrap().name(), "r2_pearson");
        assert_eq!(scorer_by_name("mape").unwrap().name(), "mape");
        assert!(matches!(
            scorer_by_name("rmse"),
            Err(Error::InvalidParameter { name: "scorer", .. })
        ));
    }

    #[test]
    fn test_check_pair() {
        assert!(matches!(
            check_pair(&[1.0, 2.0], &[1.0]),
            Err(Error::LengthMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(check_pair(&[], &[]), Err(Error::InvalidParameter { .. })));
        assert!(check_pair(&[1.0], &[3.0]).is_ok());
    }
}
