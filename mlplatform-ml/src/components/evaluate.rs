//! Evaluator stage: score candidate models on the test partition and pick
//! the winner.

use crate::artifact::{Artifact, ModelFile};
use crate::data::read_csv;
use crate::error::{MlError, Result};
use serde::{Deserialize, Serialize};

/// A trained model offered to the evaluator and deployer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCandidate {
    pub id: String,
    pub artifact: Artifact,
}

impl ModelCandidate {
    pub fn new(id: impl Into<String>, artifact: Artifact) -> Self {
        Self {
            id: id.into(),
            artifact,
        }
    }
}

/// Which candidate wins when accuracies are equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep the candidate compared first.
    #[default]
    First,
    /// Take the candidate compared later.
    Last,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub model: String,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub optimal_model: String,
    pub results: Vec<EvaluationResult>,
}

/// The result with the highest accuracy, in comparison order. A strictly
/// greater score always wins; equal scores are settled by `tie_break`.
pub fn select_optimal(results: &[EvaluationResult], tie_break: TieBreak) -> Option<&EvaluationResult> {
    let mut iter = results.iter();
    let mut best = iter.next()?;
    for candidate in iter {
        let wins = match tie_break {
            TieBreak::First => candidate.accuracy > best.accuracy,
            TieBreak::Last => candidate.accuracy >= best.accuracy,
        };
        if wins {
            best = candidate;
        }
    }
    Some(best)
}

/// Score every candidate on the test artifact and return the winner.
pub fn evaluate_model(
    candidates: &[ModelCandidate],
    test: &Artifact,
    tie_break: TieBreak,
) -> Result<Evaluation> {
    let dataset = read_csv(&test.path())?;
    let (features, labels) = dataset.split_label()?;

    let mut results = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let model = ModelFile::load(&candidate.artifact.model_path())?;
        let accuracy = model.estimator.score(&features, &labels)?;
        tracing::info!(model = %candidate.id, accuracy, "{} accuracy", model.framework);
        results.push(EvaluationResult {
            model: candidate.id.clone(),
            accuracy,
        });
    }

    let optimal = select_optimal(&results, tie_break)
        .ok_or_else(|| MlError::evaluation("no candidate models to evaluate"))?;
    tracing::info!(optimal_model = %optimal.model, accuracy = optimal.accuracy, "Selected model");
    Ok(Evaluation {
        optimal_model: optimal.model.clone(),
        results,
    })
}
