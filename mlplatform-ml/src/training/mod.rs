//! Training infrastructure: cross-validation, randomized search, metrics.

pub mod cv;
pub mod metrics;
pub mod search;

pub use cv::{Fold, StratifiedKFold};
pub use metrics::accuracy_score;
pub use search::{CandidateScore, ParamGrid, Params, RandomizedSearchCv, SearchOutcome};
