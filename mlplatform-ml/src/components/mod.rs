//! Pipeline stages. Each stage reads input artifacts, writes output
//! artifacts, and can run on its own or inside a pipeline.

pub mod batch_predict;
pub mod deploy;
pub mod evaluate;
pub mod load;
pub mod preprocess;
pub mod train;

pub use batch_predict::{BatchPredictRequest, PREDICTION_COLUMN, batch_predict};
pub use deploy::{DeployRequest, deploy_model};
pub use evaluate::{Evaluation, EvaluationResult, ModelCandidate, TieBreak, evaluate_model, select_optimal};
pub use load::load_data;
pub use preprocess::{PreprocessOptions, SplitArtifacts, preprocess_data};
pub use train::{TrainOptions, train_decision_tree, train_model, train_random_forest};
