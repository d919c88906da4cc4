use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

use crate::{PlayError, PlayResult, ResultExt};

/// How the services were launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// Long-running container entry point
    Serve,
    /// Throwaway playground in a temporary directory
    Run,
}

/// What is running, recorded while `serve` or `run` is up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_run_state"))]
pub struct RunState {
    pub started_at: DateTime<Utc>,
    pub mode: LaunchMode,
    pub root: PathBuf,
    pub questdb_pid: Option<u32>,
    pub jupyter_pid: Option<u32>,
    pub ports: BTreeMap<String, u16>,
}

impl RunState {
    pub fn new(mode: LaunchMode, root: PathBuf, ports: &[(&str, u16)]) -> Self {
        Self {
            started_at: Utc::now(),
            mode,
            root,
            questdb_pid: None,
            jupyter_pid: None,
            ports: ports.iter().map(|(name, port)| (name.to_string(), *port)).collect(),
        }
    }

    pub fn save(&self, path: &Path) -> PlayResult<()> {
        self.validate()
            .map_err(|e| PlayError::configuration(format!("Invalid run state: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_path_context(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_path_context(path)
    }

    /// Load state from `path`; `None` if nothing is recorded
    pub fn load_from_path(path: &Path) -> PlayResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).with_path_context(path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let state: RunState = serde_json::from_str(&content)?;
        state
            .validate()
            .map_err(|e| PlayError::configuration(format!("Invalid run state: {}", e)))?;
        Ok(Some(state))
    }

    /// Remove the state file. Idempotent.
    pub fn clear(path: &Path) -> PlayResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_path_context(path),
        }
    }
}

fn validate_run_state(state: &RunState) -> Result<(), ValidationError> {
    if !state.root.is_absolute() {
        return Err(ValidationError::new("root must be absolute"));
    }

    if state.started_at > Utc::now() {
        return Err(ValidationError::new("start time cannot be in the future"));
    }

    if state.ports.values().any(|p| *p == 0) {
        return Err(ValidationError::new("ports must be non-zero"));
    }

    Ok(())
}
