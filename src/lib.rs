//! Anomaly scoring for time-indexed tabular data.
//!
//! The pipeline turns a raw table (a time column plus numeric feature
//! columns) into the same table annotated with a per-row `anomaly_score`
//! and a binary `is_anomaly` label: raw input is reduced to numeric
//! columns, a presumed-normal training prefix is split off, an isolation
//! forest is fit on that prefix, and every row is scored against the fit.
//!
//! ```no_run
//! use seriesad::{analyze, AnalysisOptions, RawTable};
//!
//! let raw = RawTable::from_csv_reader(std::io::stdin())?;
//! let analysis = analyze(&raw, &AnalysisOptions::default())?;
//! for i in analysis.table.top_indices(30) {
//!     println!("{}\t{}", analysis.table.time().label(i), analysis.table.scores()[i]);
//! }
//! # Ok::<(), seriesad::AnalyzeError>(())
//! ```
//!
//! Each call to [`analyze`] is self-contained: it owns its own table,
//! matrix, and model, so concurrent analyses need no locking. Alternative
//! models plug in through [`OutlierModel`] via [`pipeline::analyze_with`].

pub mod error;
pub mod models;
pub mod pipeline;
pub mod synth;
pub mod table;

pub use error::{AnalyzeError, Result};
pub use models::{IsolationForest, OutlierModel, ScoredBatch};
pub use pipeline::{analyze, select_features, split_index, Analysis, AnalysisOptions};
pub use table::{ingest, NumericTable, RawTable, ScoredTable, TimeAxis, Value};
