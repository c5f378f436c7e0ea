//! Summary written next to the checkpoints after a successful run.

use anyhow::{Context, Result};
use congeal_registration::{Checkpoint, EngineSettings, RegistrationEngine, RegistrationOutcome, StageProfile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "registration_report.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTime {
    pub stage: String,
    pub seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
    pub subjects: Vec<String>,
    pub engine: EngineSettings,
    pub profiles: Vec<StageProfile>,
    pub stage_times: Vec<StageTime>,
    pub objective_history: Vec<f64>,
    pub final_objective: Option<f64>,
    pub checkpoints: Vec<Checkpoint>,
}

impl RunReport {
    pub fn new<E: RegistrationEngine>(
        input_directory: &Path,
        output_directory: &Path,
        subjects: Vec<String>,
        engine: EngineSettings,
        outcome: &RegistrationOutcome<E>,
    ) -> Self {
        Self {
            input_directory: input_directory.to_path_buf(),
            output_directory: output_directory.to_path_buf(),
            subjects,
            engine,
            profiles: outcome.schedule.profiles().to_vec(),
            stage_times: outcome
                .stage_times
                .iter()
                .map(|(stage, elapsed)| StageTime {
                    stage: stage.to_string(),
                    seconds: elapsed.as_secs_f64(),
                })
                .collect(),
            objective_history: outcome.engine.objective_history().to_vec(),
            final_objective: outcome.final_objective(),
            checkpoints: outcome.checkpoints.clone(),
        }
    }

    /// Per-stage elapsed seconds, as printed on the `TIME:` line.
    pub fn elapsed_seconds(&self) -> Vec<f64> {
        self.stage_times.iter().map(|t| t.seconds).collect()
    }

    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(REPORT_FILE);
        let json = serde_json::to_string_pretty(self).context("Failed to serialise run report")?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}
