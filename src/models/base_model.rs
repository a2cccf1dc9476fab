use ndarray::ArrayView2;

use crate::error::Result;

/// Scores and labels for one batch of rows, order-preserving: entry i
/// belongs to row i of the scored matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredBatch {
    /// Higher means more anomalous. Models whose raw measure decreases
    /// with anomalousness must negate it before returning.
    pub scores: Vec<f64>,
    /// 1 for rows the model's decision rule flags as outliers.
    pub labels: Vec<u8>,
}

/// A common trait for batch outlier models.
///
/// A model is fit exactly once per analysis on a presumed-normal training
/// slice, then used only for scoring. Labels must be a deterministic
/// function of the scores for a fixed fitted model.
pub trait OutlierModel {
    /// Fit the model to a training matrix. Must tolerate a single-row
    /// matrix without erroring.
    fn fit(&mut self, x: ArrayView2<'_, f64>) -> Result<()>;

    /// Score every row of `x` against the fitted model.
    fn score(&self, x: ArrayView2<'_, f64>) -> Result<ScoredBatch>;

    /// Whether `fit` has completed.
    fn is_fitted(&self) -> bool;

    /// Default: fit on `train`, then score `x`.
    fn fit_score(
        &mut self,
        train: ArrayView2<'_, f64>,
        x: ArrayView2<'_, f64>,
    ) -> Result<ScoredBatch> {
        self.fit(train)?;
        self.score(x)
    }
}
