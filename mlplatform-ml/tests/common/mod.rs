#![allow(dead_code)]

use figment::{Figment, providers::Serialized};
use mlplatform_core::{ObjectStore, PlatformConfig, StorageLocator};
use serde_json::json;
use std::path::Path;

pub const INPUT_URL: &str = "gs://pets/raw/adoption.csv";
pub const MODEL_URL: &str = "gs://pets/models/best.model.json";
pub const TABLE_REF: &str = "proj.pets.predictions";

/// Configuration with every local backend rooted under `dir`.
pub fn config(dir: &Path) -> PlatformConfig {
    let values = json!({
        "pipeline_root": "gs://pets/pipeline_root",
        "serving_image": "serving:latest",
        "project_id": "proj",
        "region": "europe-west4",
        "service_account": "runner@proj.iam.gserviceaccount.com",
        "artifact_repo": "repo",
        "gcs_url": INPUT_URL,
        "train_ratio": 0.7,
        "bucket_name": "pets",
        "model_gcs_path": MODEL_URL,
        "table_ref": TABLE_REF,
        "storage_root": dir.join("storage"),
        "registry_dir": dir.join("registry"),
        "warehouse_path": dir.join("warehouse.db"),
    });
    PlatformConfig::from_figment(Figment::from(Serialized::defaults(values))).unwrap()
}

/// `n` pet records: two numeric features, one categorical, Yes/No label.
/// Young cats and low fees are adopted.
pub fn pets_csv(n: usize) -> String {
    let mut csv = String::from("Age,Fee,Type,Adopted\n");
    for i in 0..n {
        let age = i % 12;
        let fee = 20 + (i * 37) % 180;
        let kind = if i % 3 == 0 { "Dog" } else { "Cat" };
        let adopted = if age < 6 && fee < 150 { "Yes" } else { "No" };
        csv.push_str(&format!("{age},{fee},{kind},{adopted}\n"));
    }
    csv
}

pub async fn put(store: &dyn ObjectStore, url: &str, data: &[u8]) {
    store
        .put(&StorageLocator::parse(url).unwrap(), data)
        .await
        .unwrap();
}
