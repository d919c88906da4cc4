use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{PlayError, PlayResult};

pub const DEFAULT_QUESTDB_VERSION: &str = "6.7";
pub const DEFAULT_DOWNLOAD_URL: &str =
    "https://github.com/questdb/questdb/releases/download/{version}/questdb-{version}-no-jre-bin.tar.gz";
pub const DEFAULT_NOTEBOOK_URL: &str = "https://play.questdb.io/notebooks/play.ipynb";

/// Launcher configuration loaded from config.toml and `QUESTPLAY_*` environment variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub questdb: QuestDbSettings,
    pub jupyter: JupyterSettings,
    pub python: PythonSettings,
    pub volumes: VolumeSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestDbSettings {
    pub version: String,
    /// Release archive URL; `{version}` is substituted
    pub download_url: String,
    pub root: PathBuf,
    pub http_port: u16,
    pub pg_port: u16,
    pub ilp_port: u16,
    pub query_timeout_sec: u32,
    pub strict_validation: bool,
    pub startup_timeout_sec: u64,
    pub java_home: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JupyterSettings {
    pub port: u16,
    pub bind_address: String,
    /// Defaults to a `notebooks` directory next to the QuestDB root
    pub notebook_dir: Option<PathBuf>,
    pub default_notebook: String,
    pub notebook_url: String,
    /// `Some("")` disables token authentication
    pub token: Option<String>,
    pub startup_timeout_sec: u64,
    /// Pass `--allow-root`; needed when the container runs as root
    pub allow_root: bool,
    pub open_browser: bool,
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PythonSettings {
    pub interpreter: String,
    pub packages: Vec<String>,
    pub use_venv: bool,
}

/// Generic extra mount points created alongside the QuestDB layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSettings {
    pub extra: Vec<PathBuf>,
}

impl Default for QuestDbSettings {
    fn default() -> Self {
        Self {
            version: DEFAULT_QUESTDB_VERSION.to_string(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            root: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("questplay")
                .join("questdb"),
            http_port: 9000,
            pg_port: 8812,
            ilp_port: 9009,
            query_timeout_sec: 60,
            strict_validation: true,
            startup_timeout_sec: 60,
            java_home: None,
        }
    }
}

impl Default for JupyterSettings {
    fn default() -> Self {
        Self {
            port: 8888,
            bind_address: "0.0.0.0".to_string(),
            notebook_dir: None,
            default_notebook: "play.ipynb".to_string(),
            notebook_url: DEFAULT_NOTEBOOK_URL.to_string(),
            token: None,
            startup_timeout_sec: 60,
            allow_root: false,
            open_browser: false,
            extra_args: Vec::new(),
        }
    }
}

impl Default for PythonSettings {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            packages: [
                "pyarrow",
                "numpy",
                "pandas",
                "questdb",
                "matplotlib",
                "jupyterlab",
                "requests",
                "psycopg[binary]",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            use_venv: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            questdb: QuestDbSettings::default(),
            jupyter: JupyterSettings::default(),
            python: PythonSettings::default(),
            volumes: VolumeSettings::default(),
        }
    }
}

impl QuestDbSettings {
    /// Release archive URL for the pinned version
    pub fn archive_url(&self) -> String {
        self.download_url.replace("{version}", &self.version)
    }
}

impl Settings {
    /// Load settings with precedence: defaults < TOML file < environment.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> PlayResult<Self> {
        let file = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(PlayError::configuration(format!(
                        "Config file not found: {}",
                        p.display()
                    )));
                }
                info!("Using config file: {}", p.display());
                Some(p.to_path_buf())
            }
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    info!("Using default config file: {}", default_path.display());
                    Some(default_path)
                } else {
                    debug!("No config file at {}, using defaults", default_path.display());
                    None
                }
            }
        };

        let mut settings = match file {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };

        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> PlayResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| {
            PlayError::configuration(format!("{}: {}", path.display(), e))
        })
    }

    pub fn from_toml(content: &str) -> PlayResult<Self> {
        toml::from_str(content).map_err(|e| PlayError::configuration(e.to_string()))
    }

    pub fn to_toml(&self) -> PlayResult<String> {
        toml::to_string_pretty(self).map_err(|e| PlayError::configuration(e.to_string()))
    }

    /// Apply `QUESTPLAY_*` overrides from the given lookup (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> PlayResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("QUESTPLAY_ROOT") {
            self.questdb.root = PathBuf::from(val);
        }

        if let Some(val) = lookup("QUESTPLAY_QUESTDB_VERSION") {
            self.questdb.version = val;
        }

        if let Some(val) = lookup("QUESTPLAY_DOWNLOAD_URL") {
            self.questdb.download_url = val;
        }

        if let Some(val) = lookup("QUESTPLAY_HTTP_PORT") {
            self.questdb.http_port = parse_port("QUESTPLAY_HTTP_PORT", &val)?;
        }

        if let Some(val) = lookup("QUESTPLAY_PG_PORT") {
            self.questdb.pg_port = parse_port("QUESTPLAY_PG_PORT", &val)?;
        }

        if let Some(val) = lookup("QUESTPLAY_ILP_PORT") {
            self.questdb.ilp_port = parse_port("QUESTPLAY_ILP_PORT", &val)?;
        }

        if let Some(val) = lookup("QUESTPLAY_JUPYTER_PORT") {
            self.jupyter.port = parse_port("QUESTPLAY_JUPYTER_PORT", &val)?;
        }

        if let Some(val) = lookup("QUESTPLAY_NOTEBOOK_DIR") {
            self.jupyter.notebook_dir = Some(PathBuf::from(val));
        }

        if let Some(val) = lookup("QUESTPLAY_JUPYTER_TOKEN") {
            self.jupyter.token = Some(val);
        }

        if let Some(val) = lookup("QUESTPLAY_JUPYTER_ALLOW_ROOT") {
            self.jupyter.allow_root = parse_bool("QUESTPLAY_JUPYTER_ALLOW_ROOT", &val)?;
        }

        if let Some(val) = lookup("QUESTPLAY_USE_VENV") {
            self.python.use_venv = parse_bool("QUESTPLAY_USE_VENV", &val)?;
        }

        if let Some(val) = lookup("QUESTPLAY_EXTRA_VOLUMES") {
            self.volumes.extra = std::env::split_paths(&val).collect();
        }

        Ok(())
    }

    pub fn config_path() -> PathBuf {
        if let Ok(custom_path) = std::env::var("QUESTPLAY_CONFIG_PATH") {
            PathBuf::from(custom_path)
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("questplay")
                .join("config.toml")
        }
    }

    /// Directory served by JupyterLab
    pub fn notebook_dir(&self) -> PathBuf {
        match &self.jupyter.notebook_dir {
            Some(dir) => dir.clone(),
            None => self
                .questdb
                .root
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("notebooks"),
        }
    }

    /// Re-root the QuestDB install (used by the throwaway playground)
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.questdb.root = root.into();
        self
    }

    /// Named ports in the order they are reported
    pub fn ports(&self) -> Vec<(&'static str, u16)> {
        vec![
            ("jupyter", self.jupyter.port),
            ("pg-wire", self.questdb.pg_port),
            ("http", self.questdb.http_port),
            ("ilp", self.questdb.ilp_port),
        ]
    }
}

fn parse_port(key: &str, val: &str) -> PlayResult<u16> {
    val.trim()
        .parse::<u16>()
        .map_err(|_| PlayError::configuration(format!("{} must be a port number, got '{}'", key, val)))
}

fn parse_bool(key: &str, val: &str) -> PlayResult<bool> {
    match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(PlayError::configuration(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_ports() {
        let settings = Settings::default();
        assert_eq!(settings.jupyter.port, 8888);
        assert_eq!(settings.questdb.pg_port, 8812);
        assert_eq!(settings.questdb.http_port, 9000);
        assert_eq!(settings.questdb.ilp_port, 9009);
    }

    #[test]
    fn test_archive_url() {
        let settings = QuestDbSettings::default();
        assert_eq!(
            settings.archive_url(),
            "https://github.com/questdb/questdb/releases/download/6.7/questdb-6.7-no-jre-bin.tar.gz"
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            [questdb]
            version = "7.3.10"
            root = "/opt/questdb"

            [jupyter]
            token = ""
            "#,
        )
        .unwrap();

        assert_eq!(settings.questdb.version, "7.3.10");
        assert_eq!(settings.questdb.root, PathBuf::from("/opt/questdb"));
        assert_eq!(settings.questdb.http_port, 9000);
        assert_eq!(settings.jupyter.token, Some(String::new()));
        assert_eq!(settings.python.packages.len(), 8);
    }

    #[test]
    fn test_toml_round_trip() {
        let settings = Settings::default().with_root("/opt/questdb");
        let text = settings.to_toml().unwrap();
        assert_eq!(Settings::from_toml(&text).unwrap(), settings);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("QUESTPLAY_ROOT", "/srv/questdb"),
            ("QUESTPLAY_HTTP_PORT", "19000"),
            ("QUESTPLAY_USE_VENV", "false"),
            ("QUESTPLAY_EXTRA_VOLUMES", "/vol1:/vol2"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.questdb.root, PathBuf::from("/srv/questdb"));
        assert_eq!(settings.questdb.http_port, 19000);
        assert!(!settings.python.use_venv);
        assert_eq!(
            settings.volumes.extra,
            vec![PathBuf::from("/vol1"), PathBuf::from("/vol2")]
        );
    }

    #[test]
    fn test_invalid_port_override() {
        let mut settings = Settings::default();
        let result = settings.apply_overrides(|key| {
            (key == "QUESTPLAY_PG_PORT").then(|| "not-a-port".to_string())
        });
        assert!(matches!(result, Err(PlayError::Configuration { .. })));
    }

    #[test]
    fn test_notebook_dir_defaults_next_to_root() {
        let settings = Settings::default().with_root("/opt/questdb");
        assert_eq!(settings.notebook_dir(), PathBuf::from("/opt/notebooks"));
    }
}
