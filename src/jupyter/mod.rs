//! JupyterLab, the notebook front end served next to QuestDB.

pub mod notebook;
pub mod python;

use async_trait::async_trait;
use futures::future::BoxFuture;
use reqwest::Method;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::config::JupyterSettings;
use crate::probe;
use crate::process::{retry, ChildProcess, RetryPolicy, Service};
use crate::{PlayError, PlayResult};

pub use python::PythonEnv;

pub const SERVICE_NAME: &str = "jupyterlab";

pub struct JupyterLab {
    script: PathBuf,
    notebook_dir: PathBuf,
    log_path: PathBuf,
    settings: JupyterSettings,
    client: reqwest::Client,
    process: Option<ChildProcess>,
}

impl JupyterLab {
    pub fn new(
        script: PathBuf,
        notebook_dir: PathBuf,
        log_path: PathBuf,
        settings: &JupyterSettings,
        client: reqwest::Client,
    ) -> Self {
        Self {
            script,
            notebook_dir,
            log_path,
            settings: settings.clone(),
            client,
            process: None,
        }
    }

    /// Command line for `jupyter-lab`
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--ip={}", self.settings.bind_address),
            format!("--port={}", self.settings.port),
            format!("--notebook-dir={}", self.notebook_dir.display()),
            format!("--LabApp.default_url=/lab/tree/{}", self.settings.default_notebook),
        ];
        if !self.settings.open_browser {
            args.push("--no-browser".to_string());
        }
        if let Some(token) = &self.settings.token {
            args.push(format!("--ServerApp.token={}", token));
        }
        if self.settings.allow_root {
            args.push("--allow-root".to_string());
        }
        args.extend(self.settings.extra_args.iter().cloned());
        args
    }

    /// Browser URL that opens the default notebook
    pub fn url(&self, host: &str) -> String {
        let base = format!(
            "http://{}:{}/lab/tree/{}",
            host, self.settings.port, self.settings.default_notebook
        );
        match self.settings.token.as_deref() {
            Some(token) if !token.is_empty() => format!("{}?token={}", base, token),
            _ => base,
        }
    }

    async fn is_up(&mut self) -> PlayResult<bool> {
        if let Some(process) = self.process.as_mut() {
            if let Some(status) = process.exit_status()? {
                return Err(PlayError::process_exited(
                    SERVICE_NAME,
                    format!("{}, see {}", status, process.log_path().display()),
                ));
            }
        }
        let url = format!("http://localhost:{}/api", self.settings.port);
        Ok(probe::http_ok(&self.client, Method::GET, &url, Duration::from_secs(1)).await)
    }

    fn poll_ready(&mut self) -> BoxFuture<'_, PlayResult<bool>> {
        Box::pin(self.is_up())
    }
}

#[async_trait]
impl Service for JupyterLab {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    async fn start(&mut self) -> PlayResult<()> {
        std::fs::create_dir_all(&self.notebook_dir)?;
        let args = self.args();
        info!("Starting JupyterLab: {} {}", self.script.display(), args.join(" "));
        self.process = Some(ChildProcess::spawn(
            &self.script,
            &args,
            &self.notebook_dir,
            &self.log_path,
        )?);

        let policy = RetryPolicy::with_timeout(Duration::from_secs(self.settings.startup_timeout_sec));
        let msg = format!("JupyterLab did not come up on port {}", self.settings.port);
        retry(&policy, &msg, self, JupyterLab::poll_ready).await
    }

    async fn stop(&mut self) -> PlayResult<()> {
        if let Some(mut process) = self.process.take() {
            process.terminate().await?;
        }
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.pid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lab(settings: JupyterSettings) -> JupyterLab {
        JupyterLab::new(
            PathBuf::from("jupyter-lab"),
            PathBuf::from("/opt/notebooks"),
            PathBuf::from("/opt/jupyterlab.log"),
            &settings,
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_args_bind_all_interfaces_with_default_notebook() {
        let args = lab(JupyterSettings::default()).args();
        assert!(args.contains(&"--ip=0.0.0.0".to_string()));
        assert!(args.contains(&"--port=8888".to_string()));
        assert!(args.contains(&"--no-browser".to_string()));
        assert!(args.contains(&"--notebook-dir=/opt/notebooks".to_string()));
        assert!(args.contains(&"--LabApp.default_url=/lab/tree/play.ipynb".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--ServerApp.token")));
        assert!(!args.contains(&"--allow-root".to_string()));
    }

    #[test]
    fn test_args_token_root_and_extras() {
        let mut settings = JupyterSettings::default();
        settings.token = Some(String::new());
        settings.allow_root = true;
        settings.extra_args = vec!["--ServerApp.disable_check_xsrf=True".to_string()];

        let args = lab(settings).args();
        assert!(args.contains(&"--ServerApp.token=".to_string()));
        assert!(args.contains(&"--allow-root".to_string()));
        assert_eq!(args.last().unwrap(), "--ServerApp.disable_check_xsrf=True");
    }

    #[test]
    fn test_args_open_browser() {
        let mut settings = JupyterSettings::default();
        settings.open_browser = true;
        assert!(!lab(settings).args().contains(&"--no-browser".to_string()));
    }

    #[test]
    fn test_url() {
        assert_eq!(
            lab(JupyterSettings::default()).url("localhost"),
            "http://localhost:8888/lab/tree/play.ipynb"
        );

        let mut settings = JupyterSettings::default();
        settings.token = Some("abc".to_string());
        assert_eq!(lab(settings).url("host"), "http://host:8888/lab/tree/play.ipynb?token=abc");
    }

    #[tokio::test]
    async fn test_missing_script_fails_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut lab = JupyterLab::new(
            PathBuf::from("/definitely/not/jupyter-lab"),
            dir.path().join("notebooks"),
            dir.path().join("jupyterlab.log"),
            &JupyterSettings::default(),
            reqwest::Client::new(),
        );

        let result = lab.start().await;
        assert!(matches!(result, Err(PlayError::Process { .. })));
        assert!(lab.pid().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exiting_script_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = JupyterSettings::default();
        // Nothing listens there, so readiness hinges on the exit status
        settings.port = 1;
        settings.startup_timeout_sec = 20;
        let mut lab = JupyterLab::new(
            PathBuf::from("/bin/false"),
            dir.path().join("notebooks"),
            dir.path().join("jupyterlab.log"),
            &settings,
            reqwest::Client::new(),
        );

        let started = std::time::Instant::now();
        let result = lab.start().await;
        match result {
            Err(PlayError::ProcessExited { service, status }) => {
                assert_eq!(service, SERVICE_NAME);
                assert!(status.contains("jupyterlab.log"));
            }
            other => panic!("expected ProcessExited, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(20));
    }
}
