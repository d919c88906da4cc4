//! The Python environment JupyterLab and the notebook dependencies run in.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::PythonSettings;
use crate::process::run_to_completion;
use crate::PlayResult;

const SCRIPTS_DIR: &str = if cfg!(windows) { "Scripts" } else { "bin" };

/// Either a dedicated virtualenv or the system interpreter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonEnv {
    interpreter: String,
    venv: Option<PathBuf>,
}

impl PythonEnv {
    /// Use the interpreter and scripts found on `PATH`
    pub fn system(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            venv: None,
        }
    }

    pub fn venv(interpreter: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            venv: Some(dir.into()),
        }
    }

    /// Pick a venv under `base` or the system interpreter, per settings
    pub fn from_settings(settings: &PythonSettings, base: &Path) -> Self {
        if settings.use_venv {
            Self::venv(&settings.interpreter, base.join("venv"))
        } else {
            Self::system(&settings.interpreter)
        }
    }

    pub fn venv_dir(&self) -> Option<&Path> {
        self.venv.as_deref()
    }

    /// Path (or bare name, for `PATH` lookup) of a console script such as `jupyter-lab`
    pub fn script(&self, name: &str) -> PathBuf {
        match &self.venv {
            Some(dir) => dir.join(SCRIPTS_DIR).join(name),
            None => PathBuf::from(name),
        }
    }

    /// Create the virtualenv; a no-op for the system interpreter
    pub async fn create(&self) -> PlayResult<()> {
        let Some(dir) = &self.venv else {
            return Ok(());
        };
        info!("Creating Python virtual environment at {}", dir.display());
        run_to_completion(
            Path::new(&self.interpreter),
            [OsStr::new("-m"), OsStr::new("venv"), dir.as_os_str()],
            None,
        )
        .await
    }

    pub fn pip_install_command(&self, packages: &[String]) -> (PathBuf, Vec<String>) {
        let mut args = Vec::new();
        let program = match &self.venv {
            Some(_) => self.script("pip"),
            None => {
                args.extend(["-m".to_string(), "pip".to_string()]);
                PathBuf::from(&self.interpreter)
            }
        };
        args.push("install".to_string());
        args.extend(packages.iter().cloned());
        (program, args)
    }

    pub async fn pip_install(&self, packages: &[String]) -> PlayResult<()> {
        if packages.is_empty() {
            return Ok(());
        }
        info!("pip install: {}", packages.join(" "));
        let (program, args) = self.pip_install_command(packages);
        run_to_completion(&program, &args, self.venv_dir()).await
    }

    /// Create the environment and install `packages` into it
    pub async fn setup(&self, packages: &[String]) -> PlayResult<()> {
        self.create().await?;
        self.pip_install(packages).await
    }
}
