//! Loader stage: copy a CSV object from storage into a dataset artifact.

use crate::artifact::Artifact;
use crate::data::{parse_csv, write_csv};
use crate::error::Result;
use mlplatform_core::{ObjectStore, StorageLocator};
use serde_json::json;

/// Read the CSV at `gcs_url` and write it to `output`.
///
/// The locator is validated before the store is touched.
pub async fn load_data(store: &dyn ObjectStore, gcs_url: &str, output: Artifact) -> Result<Artifact> {
    let locator = StorageLocator::parse(gcs_url)?;
    tracing::info!(%locator, "Loading dataset");

    let bytes = store.get(&locator).await?;
    let dataset = parse_csv(&bytes)?;
    write_csv(&output.path(), &dataset)?;
    tracing::debug!(
        rows = dataset.n_rows(),
        columns = dataset.n_cols(),
        uri = %output.uri,
        "Wrote dataset artifact"
    );
    Ok(output.with_metadata("format", json!("csv")))
}
