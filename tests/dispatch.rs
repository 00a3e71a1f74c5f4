//! Integration tests for stage dispatch.
//!
//! A recording runner stands in for MLflow so every invocation can be checked.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use genre_pipeline::config::PipelineConfig;
use genre_pipeline::pipeline::{
    ParamValue, Parameters, RunContext, Stage, StageDispatcher, StageInvocation,
    MODEL_CONFIG_FILE,
};
use genre_pipeline::runner::{StageOutcome, StageRunner};
use genre_pipeline::{DispatchError, RunnerError};
use serde_yaml::Value;

const CONFIG: &str = r#"
main:
  project_name: genre_classification
  experiment_name: dev
  execute_steps: [download, preprocess, check_data, segregate, random_forest, evaluate]
  random_seed: 42
data:
  file_url: https://example.com/genres_mod.parquet
  ks_alpha: 0.05
  test_size: 0.3
  val_size: 0.3
  stratify: genre
random_forest_pipeline:
  random_forest:
    n_estimators: 100
    max_depth: 13
    random_state: 7
  tfidf:
    max_features: 10
  features:
    numerical: [danceability, energy]
    nlp: [text_feature]
"#;

#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<(StageInvocation, RunContext)>>,
    fail_on: Option<Stage>,
}

impl RecordingRunner {
    fn failing_on(stage: Stage) -> Self {
        Self {
            fail_on: Some(stage),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(StageInvocation, RunContext)> {
        self.calls.lock().unwrap().clone()
    }

    fn stages(&self) -> Vec<Stage> {
        self.calls().into_iter().map(|(inv, _)| inv.stage).collect()
    }
}

#[async_trait]
impl StageRunner for RecordingRunner {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn run(
        &self,
        invocation: &StageInvocation,
        context: &RunContext,
    ) -> Result<StageOutcome, RunnerError> {
        self.calls
            .lock()
            .unwrap()
            .push((invocation.clone(), context.clone()));
        if self.fail_on == Some(invocation.stage) {
            return Err(RunnerError::StageFailed {
                stage: invocation.stage.to_string(),
                status: "exit status: 1".to_string(),
            });
        }
        Ok(StageOutcome::new(Some(0), STAGE_DURATION))
    }
}

const STAGE_DURATION: Duration = Duration::from_millis(1500);

fn config_with(overrides: &[&str]) -> PipelineConfig {
    let mut tree: Value = serde_yaml::from_str(CONFIG).unwrap();
    for raw in overrides {
        genre_pipeline::config::Override::parse(raw)
            .unwrap()
            .apply(&mut tree)
            .unwrap();
    }
    PipelineConfig::from_tree(tree).unwrap()
}

fn dispatcher(runner: Arc<RecordingRunner>, work_dir: &Path) -> StageDispatcher {
    StageDispatcher::new(runner, "/project", work_dir)
}

fn params(entries: &[(&str, ParamValue)]) -> Parameters {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

async fn run_single(stage: Stage) -> (StageInvocation, PathBuf, tempfile::TempDir) {
    let work = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let config = config_with(&[&format!("main.execute_steps={}", stage.name())]);

    let report = dispatcher(runner.clone(), work.path())
        .dispatch(&config)
        .await
        .unwrap();

    assert_eq!(report.executed(), vec![stage]);
    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    let (invocation, _) = calls.into_iter().next().unwrap();
    assert_eq!(invocation.stage_dir, PathBuf::from("/project").join(stage.name()));
    assert_eq!(invocation.entry_point, "main");
    let model_config = work.path().join(MODEL_CONFIG_FILE);
    (invocation, model_config, work)
}

#[tokio::test]
async fn test_download_parameters() {
    let (invocation, _, _work) = run_single(Stage::Download).await;
    assert_eq!(
        invocation.parameters,
        params(&[
            ("file_url", "https://example.com/genres_mod.parquet".into()),
            ("artifact_name", "raw_data.parquet".into()),
            ("artifact_type", "raw_data".into()),
            ("artifact_description", "Data as downloaded".into()),
        ])
    );
}

#[tokio::test]
async fn test_preprocess_parameters() {
    let (invocation, _, _work) = run_single(Stage::Preprocess).await;
    assert_eq!(
        invocation.parameters,
        params(&[
            ("input_artifact", "raw_data.parquet:latest".into()),
            ("artifact_name", "processed_data.csv".into()),
            ("artifact_type", "preprocessed_data".into()),
            ("artifact_description", "Preprocess of data".into()),
        ])
    );
}

#[tokio::test]
async fn test_check_data_parameters() {
    let (invocation, _, _work) = run_single(Stage::CheckData).await;
    assert_eq!(
        invocation.parameters,
        params(&[
            ("reference_artifact", "processed_data.csv:latest".into()),
            ("sample_artifact", "processed_data.csv:latest".into()),
            ("ks_alpha", ParamValue::Float(0.05)),
        ])
    );
}

#[tokio::test]
async fn test_segregate_parameters() {
    let (invocation, _, _work) = run_single(Stage::Segregate).await;
    assert_eq!(
        invocation.parameters,
        params(&[
            ("input_artifact", "processed_data.csv:latest".into()),
            ("artifact_root", "genre_data".into()),
            ("artifact_type", "train-test_data".into()),
            ("test_size", ParamValue::Float(0.3)),
            ("random_state", ParamValue::Int(42)),
            ("stratify", "genre".into()),
        ])
    );
}

#[tokio::test]
async fn test_random_forest_parameters_and_model_config() {
    let (invocation, model_config, _work) = run_single(Stage::RandomForest).await;
    assert_eq!(
        invocation.parameters,
        params(&[
            ("train_data", "genre_data_train.csv:latest".into()),
            ("model_config", ParamValue::Path(model_config.clone())),
            ("export_artifact", "genre_algo".into()),
            ("random_seed", ParamValue::Int(7)),
            ("val_size", ParamValue::Float(0.3)),
            ("stratify", "genre".into()),
        ])
    );

    let written: Value =
        serde_yaml::from_str(&std::fs::read_to_string(&model_config).unwrap()).unwrap();
    let source: Value = serde_yaml::from_str(CONFIG).unwrap();
    assert_eq!(written, source["random_forest_pipeline"]);
}

#[tokio::test]
async fn test_evaluate_parameters() {
    let (invocation, _, _work) = run_single(Stage::Evaluate).await;
    assert_eq!(
        invocation.parameters,
        params(&[
            ("model_export", "genre_algo:latest".into()),
            ("test_data", "genre_data_test.csv:latest".into()),
        ])
    );
}

#[tokio::test]
async fn test_string_and_list_selection_dispatch_identically() {
    let work = tempfile::tempdir().unwrap();

    let from_string = Arc::new(RecordingRunner::default());
    dispatcher(from_string.clone(), work.path())
        .dispatch(&config_with(&["main.execute_steps=download,evaluate"]))
        .await
        .unwrap();

    let from_list = Arc::new(RecordingRunner::default());
    dispatcher(from_list.clone(), work.path())
        .dispatch(&config_with(&["main.execute_steps=[download,evaluate]"]))
        .await
        .unwrap();

    assert_eq!(from_string.stages(), vec![Stage::Download, Stage::Evaluate]);
    assert_eq!(from_string.calls(), from_list.calls());
}

#[tokio::test]
async fn test_selection_order_does_not_change_dispatch_order() {
    let work = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    dispatcher(runner.clone(), work.path())
        .dispatch(&config_with(&["main.execute_steps=evaluate,segregate,download"]))
        .await
        .unwrap();

    assert_eq!(
        runner.stages(),
        vec![Stage::Download, Stage::Segregate, Stage::Evaluate]
    );
}

#[tokio::test]
async fn test_unknown_step_is_ignored() {
    let work = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let report = dispatcher(runner.clone(), work.path())
        .dispatch(&config_with(&["main.execute_steps=download,bogus"]))
        .await
        .unwrap();

    assert_eq!(report.executed(), vec![Stage::Download]);
    assert_eq!(runner.stages(), vec![Stage::Download]);
}

#[tokio::test]
async fn test_all_stages_share_one_run_context() {
    let work = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let report = dispatcher(runner.clone(), work.path())
        .dispatch(&config_with(&[]))
        .await
        .unwrap();

    assert_eq!(report.executed(), Stage::ALL.to_vec());
    let expected = RunContext::new("genre_classification", "dev");
    for (_, context) in runner.calls() {
        assert_eq!(context, expected);
    }
    assert_eq!(report.project, "genre_classification");
    assert_eq!(report.run_group, "dev");
}

#[tokio::test]
async fn test_seeds_come_from_distinct_keys() {
    let work = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    dispatcher(runner.clone(), work.path())
        .dispatch(&config_with(&["main.execute_steps=segregate,random_forest"]))
        .await
        .unwrap();

    let calls = runner.calls();
    assert_eq!(
        calls[0].0.parameters.get("random_state"),
        Some(&ParamValue::Int(42))
    );
    assert_eq!(
        calls[1].0.parameters.get("random_seed"),
        Some(&ParamValue::Int(7))
    );
}

#[tokio::test]
async fn test_runner_failure_stops_later_stages() {
    let work = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::failing_on(Stage::Preprocess));
    let err = dispatcher(runner.clone(), work.path())
        .dispatch(&config_with(&[]))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Runner { ref stage, .. } if stage == "preprocess"));
    assert_eq!(runner.stages(), vec![Stage::Download, Stage::Preprocess]);
    assert!(!work.path().join(MODEL_CONFIG_FILE).exists());
}

#[tokio::test]
async fn test_missing_key_fails_only_when_stage_selected() {
    let work = tempfile::tempdir().unwrap();

    let runner = Arc::new(RecordingRunner::default());
    dispatcher(runner.clone(), work.path())
        .dispatch(&config_with(&["~data.ks_alpha", "main.execute_steps=download"]))
        .await
        .unwrap();
    assert_eq!(runner.stages(), vec![Stage::Download]);

    let runner = Arc::new(RecordingRunner::default());
    let err = dispatcher(runner.clone(), work.path())
        .dispatch(&config_with(&[
            "~data.ks_alpha",
            "main.execute_steps=download,check_data,evaluate",
        ]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("data.ks_alpha"));
    assert_eq!(runner.stages(), vec![Stage::Download]);
}

#[tokio::test]
async fn test_model_config_is_overwritten() {
    let work = tempfile::tempdir().unwrap();
    let path = work.path().join(MODEL_CONFIG_FILE);
    std::fs::write(&path, "stale: true\nextra: [1, 2, 3]\n").unwrap();

    let runner = Arc::new(RecordingRunner::default());
    dispatcher(runner, work.path())
        .dispatch(&config_with(&[
            "main.execute_steps=random_forest",
            "random_forest_pipeline.random_forest.n_estimators=250",
        ]))
        .await
        .unwrap();

    let written: Value = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(written.get("stale").is_none());
    assert_eq!(written["random_forest"]["n_estimators"], Value::from(250));
}

#[tokio::test]
async fn test_plan_has_no_side_effects() {
    let work = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let dispatcher = dispatcher(runner.clone(), work.path());

    let plan = dispatcher
        .plan(&config_with(&["main.execute_steps=random_forest,evaluate"]))
        .unwrap();

    assert_eq!(
        plan.iter().map(|inv| inv.stage).collect::<Vec<_>>(),
        vec![Stage::RandomForest, Stage::Evaluate]
    );
    assert!(runner.calls().is_empty());
    assert!(!work.path().join(MODEL_CONFIG_FILE).exists());
}

#[tokio::test]
async fn test_empty_selection_runs_nothing() {
    let work = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let report = dispatcher(runner.clone(), work.path())
        .dispatch(&config_with(&["main.execute_steps="]))
        .await
        .unwrap();

    assert!(report.stages.is_empty());
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_report_uses_runner_outcome() {
    let work = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let report = dispatcher(runner, work.path())
        .dispatch(&config_with(&["main.execute_steps=download,evaluate"]))
        .await
        .unwrap();

    assert_eq!(report.stages.len(), 2);
    for record in &report.stages {
        assert_eq!(record.exit_code, Some(0));
        assert_eq!(record.duration_ms, 1500);
    }
}

#[tokio::test]
async fn test_model_config_write_failure_stops_later_stages() {
    let work = tempfile::tempdir().unwrap();
    let missing = work.path().join("not/created");
    let runner = Arc::new(RecordingRunner::default());

    let err = dispatcher(runner.clone(), &missing)
        .dispatch(&config_with(&[
            "main.execute_steps=download,random_forest,evaluate",
        ]))
        .await
        .unwrap_err();

    match err {
        DispatchError::ModelConfig { ref path, .. } => {
            assert!(path.ends_with(MODEL_CONFIG_FILE));
        }
        other => panic!("expected ModelConfig error, got {other:?}"),
    }
    assert_eq!(runner.stages(), vec![Stage::Download]);
    assert!(!runner.stages().contains(&Stage::Evaluate));
}
