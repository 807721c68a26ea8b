//! Fine-tuning driver.
//!
//! Training itself runs in an external pose-estimation trainer. This module
//! prepares everything around it: the experiment config, the manifest root,
//! the choice between resuming and starting fresh, and the command line.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{PipelineError, Result};
use crate::io::refresh_manifest_path;

/// Weights fetched by the trainer when no local model is available
pub const DEFAULT_POSE_MODEL: &str = "yolo11n-pose.pt";

/// Environment variable holding the experiment tracker key
pub const TRACKER_KEY_ENV: &str = "WANDB_API_KEY";

/// Credentials file looked up beside the experiment config
pub const ENV_FILE: &str = ".env";

// Arguments the driver sets itself and a config may not override
const RESERVED_KEYS: &[&str] = &["data", "model", "project", "name", "resume", "plots"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSection {
    /// Path of the dataset manifest (`data.yaml`)
    pub config_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    pub base_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub use_wandb: bool,
}

/// One experiment definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub project_name: String,
    pub run_name: String,
    pub data: DataSection,
    pub model: ModelSection,
    pub output: OutputSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// Trainer keyword arguments, forwarded in file order
    #[serde(default)]
    pub train: Mapping,
}

impl ExperimentConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| PipelineError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.run_name.trim().is_empty() {
            return Err(PipelineError::Config("run_name must not be empty".to_string()));
        }
        for key in self.train.keys() {
            let name = key.as_str().ok_or_else(|| {
                PipelineError::Config(format!("train keys must be strings, got {:?}", key))
            })?;
            if RESERVED_KEYS.contains(&name) {
                return Err(PipelineError::Config(format!(
                    "train.{} is set by the driver and cannot be overridden",
                    name
                )));
            }
        }
        Ok(())
    }

    /// `<output.base_dir>/<run_name>/weights/last.pt`
    pub fn last_checkpoint(&self) -> PathBuf {
        self.output
            .base_dir
            .join(&self.run_name)
            .join("weights")
            .join("last.pt")
    }
}

/// Where the starting weights come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Continue an interrupted run from its last checkpoint
    Resume(PathBuf),
    /// Fine-tune the configured base model
    Start(PathBuf),
    /// Let the trainer download a stock pose model
    Download(String),
}

impl ModelSource {
    pub fn weights(&self) -> String {
        match self {
            ModelSource::Resume(path) | ModelSource::Start(path) => {
                path.to_string_lossy().into_owned()
            }
            ModelSource::Download(name) => name.clone(),
        }
    }

    pub fn is_resume(&self) -> bool {
        matches!(self, ModelSource::Resume(_))
    }
}

/// Resume when a checkpoint exists, else start from the base model, else download
pub fn resolve_model_source(config: &ExperimentConfig) -> ModelSource {
    let last = config.last_checkpoint();
    if last.is_file() {
        info!("Found checkpoint, resuming: {}", last.display());
        ModelSource::Resume(last)
    } else if config.model.base_path.is_file() {
        info!("Starting from base model: {}", config.model.base_path.display());
        ModelSource::Start(config.model.base_path.clone())
    } else {
        warn!(
            "Model not found at {}, the trainer will download {}",
            config.model.base_path.display(),
            DEFAULT_POSE_MODEL
        );
        ModelSource::Download(DEFAULT_POSE_MODEL.to_string())
    }
}

/// Render a YAML value as a trainer `key=value` right-hand side
pub fn format_arg_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => format!(
            "[{}]",
            items.iter().map(format_arg_value).collect::<Vec<_>>().join(",")
        ),
        Value::Mapping(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{}:{}", format_arg_value(k), format_arg_value(v)))
                .collect::<Vec<_>>()
                .join(",")
        ),
        Value::Tagged(tagged) => format_arg_value(&tagged.value),
    }
}

/// A fully resolved trainer invocation
#[derive(Debug, Clone)]
pub struct TrainingPlan {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub source: ModelSource,
    pub sampling_step: Option<usize>,
}

impl TrainingPlan {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn run(&self) -> Result<()> {
        info!(
            "Starting pose training (resume: {}): {}",
            self.source.is_resume(),
            self.command_line()
        );
        let status = Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .status()
            .map_err(|e| PipelineError::Trainer(format!("failed to launch {}: {}", self.program, e)))?;

        if status.success() {
            info!("Training finished.");
            Ok(())
        } else {
            Err(PipelineError::Trainer(format!(
                "{} exited with {}",
                self.program, status
            )))
        }
    }
}

/// Build the trainer command for an experiment.
///
/// `manifest_path` must already point at a refreshed manifest.
pub fn build_plan(
    config: &ExperimentConfig,
    trainer: &str,
    manifest_path: &Path,
    source: ModelSource,
    sampling_step: Option<usize>,
    tracker_key_present: bool,
) -> TrainingPlan {
    let mut args = vec![
        "pose".to_string(),
        "train".to_string(),
        format!("data={}", manifest_path.display()),
        format!("model={}", source.weights()),
        format!("project={}", config.output.base_dir.display()),
        format!("name={}", config.run_name),
        format!("resume={}", format_arg_value(&Value::Bool(source.is_resume()))),
        "plots=True".to_string(),
    ];
    args.extend(config.train.iter().filter_map(|(key, value)| {
        key.as_str()
            .map(|key| format!("{}={}", key, format_arg_value(value)))
    }));

    let mut envs = Vec::new();
    if config.logging.use_wandb {
        if tracker_key_present {
            envs.push(("WANDB_PROJECT".to_string(), config.project_name.clone()));
            envs.push(("WANDB_NAME".to_string(), config.run_name.clone()));
            envs.push(("WANDB_RESUME".to_string(), "allow".to_string()));
            envs.push((
                "WANDB_DIR".to_string(),
                config.output.base_dir.to_string_lossy().into_owned(),
            ));
        } else {
            warn!(
                "logging.use_wandb is set but {} is missing, training without tracking",
                TRACKER_KEY_ENV
            );
            envs.push(("WANDB_MODE".to_string(), "disabled".to_string()));
        }
    }

    TrainingPlan {
        program: trainer.to_string(),
        args,
        envs,
        source,
        sampling_step,
    }
}

/// Load tracker credentials from the `.env` next to the experiment config,
/// falling back to the usual lookup from the working directory.
///
/// Variables already set in the environment are left alone. Returns the file
/// that was loaded, if any.
pub fn load_env_file(config_path: &Path) -> Option<PathBuf> {
    let beside_config = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join(ENV_FILE);

    match dotenv::from_path(&beside_config) {
        Ok(()) => Some(beside_config),
        Err(_) => dotenv::dotenv().ok(),
    }
}

/// Load an experiment, refresh its manifest and resolve the trainer command
pub fn prepare_training(config_path: &Path, trainer: &str) -> Result<TrainingPlan> {
    let config = ExperimentConfig::from_path(config_path)?;
    match load_env_file(config_path) {
        Some(path) => info!("Loaded environment from {}", path.display()),
        None => debug!("No {} file found", ENV_FILE),
    }

    let manifest_path = &config.data.config_path;
    let manifest = refresh_manifest_path(manifest_path)?;
    match manifest.sampling_step {
        Some(step) => info!("Dataset sampling step: {}", step),
        None => info!("Dataset sampling step: Unknown"),
    }

    let source = resolve_model_source(&config);
    let tracker_key_present = std::env::var_os(TRACKER_KEY_ENV).is_some_and(|v| !v.is_empty());

    Ok(build_plan(
        &config,
        trainer,
        manifest_path,
        source,
        manifest.sampling_step,
        tracker_key_present,
    ))
}
