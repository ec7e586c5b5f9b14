//! R² via Pearson correlation and mean absolute percentage error.

use super::{check_pair, Direction, Scorer};
use geoagg_core::Result;
use tracing::warn;

// =============================================================================
// R² (squared Pearson correlation)
// =============================================================================

/// Squared Pearson correlation between ground truth and predictions.
///
/// Higher is better. Scale and offset of the predictions do not matter,
/// so `[2, 4, 6]` scores `1.0` against `[1, 2, 3]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct R2Pearson;

impl Scorer for R2Pearson {
    fn score(&self, y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
        r2_pearson(y_true, y_pred)
    }

    fn direction(&self) -> Direction {
        Direction::Maximize
    }

    fn name(&self) -> &'static str {
        "r2_pearson"
    }
}

/// Square of the Pearson correlation coefficient of `y` and `yhat`.
///
/// Returns `NaN` (with a warning) when either input is constant, since the
/// correlation is undefined there.
pub fn r2_pearson(y: &[f64], yhat: &[f64]) -> Result<f64> {
    check_pair(y, yhat)?;

    let n = y.len() as f64;
    let mean_y = y.iter().sum::<f64>() / n;
    let mean_p = yhat.iter().sum::<f64>() / n;

    let (mut cov, mut var_y, mut var_p) = (0.0, 0.0, 0.0);
    for (&a, &b) in y.iter().zip(yhat) {
        let dy = a - mean_y;
        let dp = b - mean_p;
        cov += dy * dp;
        var_y += dy * dy;
        var_p += dp * dp;
    }

    if var_y == 0.0 || var_p == 0.0 {
        warn!("constant input, Pearson correlation is undefined");
        return Ok(f64::NAN);
    }

    let r = cov / (var_y.sqrt() * var_p.sqrt());
    Ok(r * r)
}

// =============================================================================
// MAPE (Mean Absolute Percentage Error)
// =============================================================================

/// Mean Absolute Percentage Error: mean(|(y - yhat) / y|)
///
/// Lower is better. Samples with `y == 0` contribute zero but still count
/// towards the sample total.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mape;

impl Scorer for Mape {
    fn score(&self, y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
        mape(y_true, y_pred)
    }

    fn direction(&self) -> Direction {
        Direction::Minimize
    }

    fn name(&self) -> &'static str {
        "mape"
    }
}

/// Mean of `|(y - yhat) / y|`, zero-truth samples contributing `0`.
///
/// The ratio is taken as a fraction, not a percentage.
pub fn mape(y: &[f64], yhat: &[f64]) -> Result<f64> {
    check_pair(y, yhat)?;

    let sum: f64 = y
        .iter()
        .zip(yhat)
        .map(|(&a, &b)| if a == 0.0 { 0.0 } else { ((a - b) / a).abs() })
        .sum();

    Ok(sum / y.len() as f64)
}
