//! CLI subcommand handlers.

use crate::{AlgorithmArg, Commands, PipelineKind, TieBreakArg};
use anyhow::Context;
use mlplatform_core::{PlatformConfig, load_config};
use mlplatform_ml::algorithms::Algorithm;
use mlplatform_ml::artifact::Artifact;
use mlplatform_ml::components::{
    BatchPredictRequest, DeployRequest, ModelCandidate, PreprocessOptions, TieBreak, TrainOptions,
    batch_predict, deploy_model, evaluate_model, load_data, preprocess_data, train_model,
};
use mlplatform_ml::pipeline::{
    LocalRunner, PipelineSpec, Services, compile, inference_pipeline, training_pipeline,
};
use mlplatform_ml::serving::{EndpointState, serve};
use std::path::Path;
use std::sync::Arc;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    let config =
        load_config(Some(workspace)).map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    tracing::debug!(
        workspace = %workspace.display(),
        project = %config.project_id,
        "Configuration loaded"
    );

    match command {
        Commands::Compile { output } => handle_compile(&config, &output),
        Commands::Run { pipeline, spec } => handle_run(&config, pipeline, spec.as_deref()).await,
        Commands::Load { gcs_url, output } => {
            let services = Services::from_config(&config);
            let url = gcs_url.unwrap_or_else(|| config.gcs_url.clone());
            let artifact = load_data(services.store.as_ref(), &url, artifact_at("dataset", &output)).await?;
            println!("Dataset written to {}", artifact.uri);
            Ok(())
        }
        Commands::Preprocess {
            input,
            train_ratio,
            seed,
            train_output,
            test_output,
        } => {
            let options = PreprocessOptions::new(train_ratio.unwrap_or(config.train_ratio))
                .with_seed(seed.unwrap_or(config.split_seed));
            let split = preprocess_data(
                &artifact_at("dataset", &input),
                &options,
                artifact_at("train_dataset", &train_output),
                artifact_at("test_dataset", &test_output),
            )?;
            println!("Train set: {}", split.train.uri);
            println!("Test set: {}", split.test.uri);
            Ok(())
        }
        Commands::Train {
            algorithm,
            train,
            output,
            n_iter,
            cv,
            seed,
        } => {
            let algorithm = match algorithm {
                AlgorithmArg::DecisionTree => Algorithm::DecisionTree,
                AlgorithmArg::RandomForest => Algorithm::RandomForest,
            };
            let model = train_model(
                algorithm,
                &artifact_at("train_dataset", &train),
                artifact_at("model", &output),
                &TrainOptions { n_iter, cv, seed },
            )?;
            println!("{}", serde_json::to_string_pretty(&model.metadata)?);
            println!("Model written to {}", model.model_path().display());
            Ok(())
        }
        Commands::Evaluate {
            test,
            candidates,
            tie_break,
        } => {
            let candidates = parse_candidates(&candidates)?;
            let tie_break = match tie_break {
                TieBreakArg::First => TieBreak::First,
                TieBreakArg::Last => TieBreak::Last,
            };
            let evaluation = evaluate_model(&candidates, &artifact_at("test_dataset", &test), tie_break)?;
            for result in &evaluation.results {
                println!("  {:<20} {:.4}", result.model, result.accuracy);
            }
            println!("{}", evaluation.optimal_model);
            Ok(())
        }
        Commands::Deploy {
            optimal_model,
            candidates,
            serving_image,
        } => {
            let candidates = parse_candidates(&candidates)?;
            let serving_image = match serving_image {
                Some(image) => image,
                None => config.require_serving_image()?.to_string(),
            };
            let services = Services::from_config(&config);
            let endpoint = deploy_model(
                &services.registry,
                &DeployRequest {
                    optimal_model: &optimal_model,
                    candidates: &candidates,
                    serving_image: &serving_image,
                    project: &config.project_id,
                    region: &config.region,
                    display_name: &config.model_display_name,
                    machine_type: &config.machine_type,
                },
            )?;
            println!("{endpoint}");
            Ok(())
        }
        Commands::BatchPredict {
            model_gcs_path,
            input_data_gcs_path,
            table_ref,
            project,
            target_column,
            sample_size,
            seed,
        } => {
            let mut request =
                BatchPredictRequest::new(model_gcs_path, input_data_gcs_path, table_ref, project)
                    .with_sample_size(sample_size.unwrap_or(config.batch_sample_size));
            request.target_column = target_column;
            request.seed = seed;
            let services = Services::from_config(&config);
            let message =
                batch_predict(services.store.as_ref(), services.warehouse.as_ref(), &request).await?;
            println!("{message}");
            Ok(())
        }
        Commands::Serve { endpoint, addr } => {
            let services = Services::from_config(&config);
            let serving = services.registry.load_serving_model(&endpoint)?;
            println!(
                "Serving {} ({}) on http://{addr}{}",
                serving.model.display_name, serving.model.framework, serving.model.predict_route
            );
            serve(Arc::new(EndpointState::from(serving)), addr).await?;
            Ok(())
        }
    }
}

fn artifact_at(name: &str, path: &Path) -> Artifact {
    Artifact::new(name, path.to_string_lossy().into_owned())
}

/// Parse `<id>=<path>` candidate arguments, keeping their order.
fn parse_candidates(raw: &[String]) -> anyhow::Result<Vec<ModelCandidate>> {
    raw.iter()
        .map(|entry| {
            let (id, path) = entry
                .split_once('=')
                .filter(|(id, path)| !id.is_empty() && !path.is_empty())
                .with_context(|| format!("candidate '{entry}' must look like <id>=<path>"))?;
            Ok(ModelCandidate::new(id, artifact_at(id, Path::new(path))))
        })
        .collect()
}

fn builtin_pipelines(config: &PlatformConfig) -> anyhow::Result<Vec<PipelineSpec>> {
    Ok(vec![training_pipeline(config)?, inference_pipeline(config)])
}

fn handle_compile(config: &PlatformConfig, output: &Path) -> anyhow::Result<()> {
    for spec in builtin_pipelines(config)? {
        let path = output.join(format!("{}.json", spec.name));
        compile(&spec, &path)?;
        println!("Compiled {} -> {}", spec.name, path.display());
    }
    Ok(())
}

async fn handle_run(
    config: &PlatformConfig,
    pipeline: Option<PipelineKind>,
    spec_path: Option<&Path>,
) -> anyhow::Result<()> {
    let spec = match (pipeline, spec_path) {
        (_, Some(path)) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<PipelineSpec>(&text)
                .with_context(|| format!("Invalid pipeline file {}", path.display()))?
        }
        (Some(PipelineKind::Inference), None) => inference_pipeline(config),
        (Some(PipelineKind::Training) | None, None) => training_pipeline(config)?,
    };

    let runner = LocalRunner::new(Services::from_config(config), config.pipeline_root_dir());
    let result = runner.run(&spec).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_candidates_keeps_order() {
        let parsed = parse_candidates(&[
            "random_forest=runs/rf/model".to_string(),
            "decision_tree=runs/dt/model".to_string(),
        ])
        .unwrap();
        let ids: Vec<&str> = parsed.iter().map(|c| c.id.as_str()).collect();
        pretty_assertions::assert_eq!(ids, vec!["random_forest", "decision_tree"]);
        assert_eq!(parsed[0].artifact.uri, "runs/rf/model");
    }

    #[test]
    fn test_parse_candidates_rejects_malformed() {
        for bad in ["random_forest", "=path", "id="] {
            assert!(parse_candidates(&[bad.to_string()]).is_err(), "{bad}");
        }
    }
}
