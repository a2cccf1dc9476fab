use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnalyzeError, Result};
use crate::models::iforest::{
    IsolationForest, DEFAULT_CONTAMINATION, DEFAULT_MAX_SAMPLES, DEFAULT_N_ESTIMATORS,
    DEFAULT_SEED,
};
use crate::models::OutlierModel;
use crate::table::{ingest, NumericTable, RawTable, ScoredTable, TIME_COLUMN};

/// Minimum number of rows the split policy reserves for training.
pub const MIN_TRAIN_ROWS: usize = 10;

/// Fraction of the series presumed to begin in a normal operating regime.
pub const TRAIN_FRACTION: f64 = 0.6;

/// Tunables for one analysis. Everything is an explicit parameter; the
/// pipeline keeps no ambient configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Expected proportion of anomalous rows.
    pub contamination: f64,
    /// Feature columns to score on; defaults to every non-time column.
    pub features: Option<Vec<String>>,
    /// Ensemble size of the default isolation forest.
    pub n_estimators: usize,
    /// Random seed for the default isolation forest.
    pub seed: u64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            contamination: DEFAULT_CONTAMINATION,
            features: None,
            n_estimators: DEFAULT_N_ESTIMATORS,
            seed: DEFAULT_SEED,
        }
    }
}

/// Output of [`analyze`]: the annotated table and the features it was
/// scored on.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub table: ScoredTable,
    pub features: Vec<String>,
}

/// Pick the feature columns to score on.
///
/// Explicit names are used verbatim after validation; otherwise every
/// non-time column of the table, in table order.
pub fn select_features(table: &NumericTable, explicit: Option<&[String]>) -> Result<Vec<String>> {
    let features: Vec<String> = match explicit {
        Some(names) => {
            for name in names {
                if name == TIME_COLUMN {
                    return Err(AnalyzeError::TimeAsFeature);
                }
                if table.column(name).is_none() {
                    return Err(AnalyzeError::UnknownFeature(name.clone()));
                }
            }
            names.to_vec()
        }
        None => table.feature_names().map(String::from).collect(),
    };
    if features.is_empty() {
        return Err(AnalyzeError::NoFeatures);
    }
    Ok(features)
}

/// Training-prefix length: `max(10, floor(0.6 * n_rows))`.
///
/// May exceed `n_rows` for small inputs; callers clamp the slice to the
/// available rows rather than rely on silent truncation.
pub fn split_index(n_rows: usize) -> usize {
    MIN_TRAIN_ROWS.max((TRAIN_FRACTION * n_rows as f64) as usize)
}

/// Project the table onto the feature columns as an N×F matrix. Row i of
/// the matrix corresponds to row i of the table.
pub fn project(table: &NumericTable, features: &[String]) -> Result<Array2<f64>> {
    let columns: Vec<&[f64]> = features
        .iter()
        .map(|name| {
            table
                .column(name)
                .ok_or_else(|| AnalyzeError::UnknownFeature(name.clone()))
        })
        .collect::<Result<_>>()?;
    let n = table.len();
    let mut flat = Vec::with_capacity(n * features.len());
    for i in 0..n {
        for col in &columns {
            flat.push(col[i]);
        }
    }
    Ok(Array2::from_shape_vec((n, features.len()), flat).unwrap())
}

/// Score a raw table for anomalies with the default isolation forest.
///
/// Ingests the table, selects features, fits the model on the presumed
/// normal training prefix, and scores every row against the fit. Each call
/// owns its own table, matrix, and model; nothing is shared or cached
/// across calls.
pub fn analyze(raw: &RawTable, options: &AnalysisOptions) -> Result<Analysis> {
    let mut model = IsolationForest::new(
        options.n_estimators,
        DEFAULT_MAX_SAMPLES,
        options.contamination,
        options.seed,
    );
    analyze_with(raw, options, &mut model)
}

/// [`analyze`] with a caller-supplied outlier model.
pub fn analyze_with<M: OutlierModel>(
    raw: &RawTable,
    options: &AnalysisOptions,
    model: &mut M,
) -> Result<Analysis> {
    let table = ingest(raw)?;
    let features = select_features(&table, options.features.as_deref())?;
    let x = project(&table, &features)?;
    let n = x.nrows();
    let split = split_index(n).clamp(1, n);
    debug!(
        rows = n,
        features = features.len(),
        split,
        "fitting outlier model on training prefix"
    );
    model.fit(x.slice(s![..split, ..]))?;
    let batch = model.score(x.view())?;
    if batch.scores.len() != n || batch.labels.len() != n {
        return Err(AnalyzeError::ModelFit(format!(
            "model returned {} scores and {} labels for {} rows",
            batch.scores.len(),
            batch.labels.len(),
            n
        )));
    }
    debug!(
        anomalies = batch.labels.iter().filter(|&&l| l == 1).count(),
        "scoring complete"
    );
    Ok(Analysis {
        table: ScoredTable::new(table, batch.scores, batch.labels),
        features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn two_feature_table() -> NumericTable {
        let raw = RawTable::from_columns(vec![
            ("time", vec![0.0.into(), 1.0.into(), 2.0.into()]),
            ("a", vec![1.0.into(), 2.0.into(), 3.0.into()]),
            ("b", vec![4.0.into(), 5.0.into(), 6.0.into()]),
        ]);
        ingest(&raw).unwrap()
    }

    #[test]
    fn split_index_floors_and_enforces_minimum() {
        assert_eq!(split_index(5), 10);
        assert_eq!(split_index(10), 10);
        assert_eq!(split_index(20), 12);
        assert_eq!(split_index(21), 12); // floor(12.6)
        assert_eq!(split_index(100), 60);
    }

    #[test]
    fn default_features_exclude_time() {
        let table = two_feature_table();
        let features = select_features(&table, None).unwrap();
        assert_eq!(features, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn explicit_features_used_verbatim() {
        let table = two_feature_table();
        let explicit = vec!["b".to_string()];
        assert_eq!(select_features(&table, Some(&explicit)).unwrap(), explicit);
    }

    #[test]
    fn explicit_features_are_validated() {
        let table = two_feature_table();
        let unknown = vec!["c".to_string()];
        assert!(matches!(
            select_features(&table, Some(&unknown)),
            Err(AnalyzeError::UnknownFeature(name)) if name == "c"
        ));
        let time = vec!["time".to_string()];
        assert!(matches!(
            select_features(&table, Some(&time)),
            Err(AnalyzeError::TimeAsFeature)
        ));
    }

    #[test]
    fn time_only_table_has_no_features() {
        let raw = RawTable::from_columns(vec![(
            "time",
            vec![Value::Number(0.0), Value::Number(1.0)],
        )]);
        let table = ingest(&raw).unwrap();
        assert!(matches!(
            select_features(&table, None),
            Err(AnalyzeError::NoFeatures)
        ));
    }

    #[test]
    fn project_preserves_row_and_feature_order() {
        let table = two_feature_table();
        let features = vec!["b".to_string(), "a".to_string()];
        let x = project(&table, &features).unwrap();
        assert_eq!(x.shape(), &[3, 2]);
        assert_eq!(x[[0, 0]], 4.0);
        assert_eq!(x[[0, 1]], 1.0);
        assert_eq!(x[[2, 0]], 6.0);
    }
}
