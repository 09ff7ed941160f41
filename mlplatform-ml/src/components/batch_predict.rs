//! Batch predictor stage: score a random sample of rows with a persisted
//! model and append the predictions to a warehouse table.

use crate::artifact::ModelFile;
use crate::data::{parse_csv, sample_rows};
use crate::error::{MlError, Result};
use mlplatform_core::{FieldType, FieldValue, ObjectStore, SchemaField, StorageLocator, TableRef, Warehouse};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// The single column of the prediction table.
pub const PREDICTION_COLUMN: &str = "prediction";

#[derive(Debug, Clone)]
pub struct BatchPredictRequest {
    pub model_gcs_path: String,
    pub input_data_gcs_path: String,
    pub table_ref: String,
    pub project: String,
    /// Column dropped before scoring. `None` drops the last column.
    pub target_column: Option<String>,
    pub sample_size: usize,
    /// Fixes the row sample; `None` samples from entropy.
    pub seed: Option<u64>,
}

impl BatchPredictRequest {
    pub fn new(
        model_gcs_path: impl Into<String>,
        input_data_gcs_path: impl Into<String>,
        table_ref: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            model_gcs_path: model_gcs_path.into(),
            input_data_gcs_path: input_data_gcs_path.into(),
            table_ref: table_ref.into(),
            project: project.into(),
            target_column: None,
            sample_size: 4,
            seed: None,
        }
    }

    pub fn with_target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Run batch prediction and return a confirmation naming the table.
///
/// Both locators and the table reference are validated before any I/O.
pub async fn batch_predict(
    store: &dyn ObjectStore,
    warehouse: &dyn Warehouse,
    request: &BatchPredictRequest,
) -> Result<String> {
    let model_locator = StorageLocator::parse(&request.model_gcs_path)?;
    let input_locator = StorageLocator::parse(&request.input_data_gcs_path)?;
    let table = TableRef::parse(&request.table_ref)?;
    if request.sample_size == 0 {
        return Err(MlError::invalid_input("sample size must be at least 1"));
    }

    let model = ModelFile::from_slice(&store.get(&model_locator).await?)?;
    tracing::info!(
        model = %model_locator,
        framework = %model.framework,
        project = %request.project,
        "Loaded model"
    );
    let dataset = parse_csv(&store.get(&input_locator).await?)?;

    let mut rng = match request.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut features = sample_rows(&dataset, request.sample_size, &mut rng)?;
    match &request.target_column {
        Some(column) => {
            if !features.drop_column(column) {
                tracing::warn!(column = %column, "Target column not in input data; nothing dropped");
            }
        }
        None => features.drop_last_column()?,
    }

    let predictions = model.estimator.predict(&features)?;
    let rows = predictions
        .iter()
        .map(|prediction| {
            prediction
                .as_f64()
                .map(|value| vec![FieldValue::Float(value)])
                .ok_or_else(|| MlError::model(format!("prediction '{prediction}' is not numeric")))
        })
        .collect::<Result<Vec<_>>>()?;
    let schema = [SchemaField::new(PREDICTION_COLUMN, FieldType::Float)];

    let job = warehouse.append(&table, &schema, rows).await?;
    tracing::info!(
        job_id = %job.job_id,
        table = %table,
        rows = job.rows_written,
        "Appended predictions"
    );
    Ok(format!("Predictions written to {}", request.table_ref))
}
