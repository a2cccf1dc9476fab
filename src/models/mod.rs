pub mod base_model;
pub mod iforest;

pub use base_model::{OutlierModel, ScoredBatch};
pub use iforest::IsolationForest;
