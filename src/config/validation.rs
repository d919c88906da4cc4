//! Configuration validation for the launcher

use std::collections::HashSet;
use tracing::{info, warn, error};

use crate::config::settings::{JupyterSettings, PythonSettings, QuestDbSettings, Settings, VolumeSettings};
use crate::{PlayError, PlayResult};

/// Comprehensive configuration validator
pub struct ConfigurationValidator {
    /// Whether to perform strict validation (fails on warnings)
    strict_mode: bool,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigurationValidator {
    pub fn new(strict_mode: bool) -> Self {
        Self {
            strict_mode,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Validate complete configuration
    pub fn validate_settings(&mut self, settings: &Settings) -> PlayResult<()> {
        info!("Starting configuration validation");

        self.validate_questdb(&settings.questdb);
        self.validate_jupyter(&settings.jupyter);
        self.validate_python(&settings.python);
        self.validate_volumes(&settings.volumes, settings);
        self.validate_port_conflicts(settings);

        self.print_validation_summary();

        if !self.errors.is_empty() {
            return Err(PlayError::configuration(format!(
                "validation failed with {} errors: {}",
                self.errors.len(),
                self.errors.join("; ")
            )));
        }

        if self.strict_mode && !self.warnings.is_empty() {
            return Err(PlayError::configuration(format!(
                "validation failed in strict mode with {} warnings: {}",
                self.warnings.len(),
                self.warnings.join("; ")
            )));
        }

        info!("Configuration validation passed");
        Ok(())
    }

    fn validate_questdb(&mut self, questdb: &QuestDbSettings) {
        if questdb.version.trim().is_empty() {
            self.errors.push("questdb.version must not be empty".to_string());
        }

        if !questdb.download_url.starts_with("http://") && !questdb.download_url.starts_with("https://") {
            self.errors.push("questdb.download_url must be a valid HTTP/HTTPS URL".to_string());
        } else if !questdb.download_url.contains("{version}") {
            self.warnings.push(
                "questdb.download_url has no {version} placeholder; the version setting is ignored".to_string(),
            );
        }

        if !questdb.root.is_absolute() {
            self.errors.push(format!("questdb.root must be absolute: {}", questdb.root.display()));
        }

        if questdb.query_timeout_sec == 0 {
            self.errors.push("questdb.query_timeout_sec must be greater than 0".to_string());
        }

        if questdb.startup_timeout_sec < 10 {
            self.warnings.push("questdb.startup_timeout_sec is very short (< 10s). The JVM may not be ready in time".to_string());
        }

        if let Some(java_home) = &questdb.java_home {
            if !java_home.exists() {
                self.errors.push(format!("questdb.java_home does not exist: {}", java_home.display()));
            }
        }
    }

    fn validate_jupyter(&mut self, jupyter: &JupyterSettings) {
        if jupyter.bind_address.parse::<std::net::IpAddr>().is_err() {
            self.errors.push(format!("jupyter.bind_address is not an IP address: {}", jupyter.bind_address));
        }

        if !jupyter.default_notebook.ends_with(".ipynb") {
            self.warnings.push(format!(
                "jupyter.default_notebook does not look like a notebook: {}",
                jupyter.default_notebook
            ));
        }

        if !jupyter.notebook_url.starts_with("http://") && !jupyter.notebook_url.starts_with("https://") {
            self.errors.push("jupyter.notebook_url must be a valid HTTP/HTTPS URL".to_string());
        }

        if let Some(dir) = &jupyter.notebook_dir {
            if !dir.is_absolute() {
                self.errors.push(format!("jupyter.notebook_dir must be absolute: {}", dir.display()));
            }
        }

        if matches!(jupyter.token.as_deref(), Some("")) && jupyter.bind_address == "0.0.0.0" {
            self.warnings.push("JupyterLab token auth is disabled while bound to all interfaces".to_string());
        }
    }

    fn validate_python(&mut self, python: &PythonSettings) {
        if python.interpreter.trim().is_empty() {
            self.errors.push("python.interpreter must not be empty".to_string());
        }

        if !python.packages.iter().any(|p| p == "jupyterlab") {
            self.warnings.push("python.packages does not include jupyterlab".to_string());
        }
    }

    fn validate_volumes(&mut self, volumes: &VolumeSettings, settings: &Settings) {
        for volume in &volumes.extra {
            if !volume.is_absolute() {
                self.errors.push(format!("volume path must be absolute: {}", volume.display()));
            }
            if volume == &settings.questdb.root {
                self.errors.push(format!("volume path collides with questdb.root: {}", volume.display()));
            }
        }
    }

    fn validate_port_conflicts(&mut self, settings: &Settings) {
        let mut seen = HashSet::new();
        for (name, port) in settings.ports() {
            if port == 0 {
                self.errors.push(format!("{} port must not be 0", name));
            } else if !seen.insert(port) {
                self.errors.push(format!("{} port {} is used by another service", name, port));
            } else if port < 1024 {
                self.warnings.push(format!("{} port {} is privileged", name, port));
            }
        }
    }

    fn print_validation_summary(&self) {
        if !self.warnings.is_empty() {
            warn!("Configuration warnings ({}):", self.warnings.len());
            for (i, warning) in self.warnings.iter().enumerate() {
                warn!("  {}: {}", i + 1, warning);
            }
        }

        if !self.errors.is_empty() {
            error!("Configuration errors ({}):", self.errors.len());
            for (i, error) in self.errors.iter().enumerate() {
                error!("  {}: {}", i + 1, error);
            }
        }

        if self.warnings.is_empty() && self.errors.is_empty() {
            info!("Configuration validation completed successfully with no issues");
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// Quick validation function for use in main application
pub fn validate_configuration(settings: &Settings, strict: bool) -> PlayResult<()> {
    let mut validator = ConfigurationValidator::new(strict);
    validator.validate_settings(settings)
}
