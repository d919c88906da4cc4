//! CLI command implementations.

use anyhow::Result;
use reqwest::Method;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{validate_configuration, Settings};
use crate::http;
use crate::java::{require_java, JavaVersion};
use crate::jupyter::{self, notebook, JupyterLab, PythonEnv};
use crate::probe;
use crate::process::{Service, Supervisor};
use crate::questdb::{self, Installer, Layout, QuestDb, ServerConf};
use crate::state::{LaunchMode, RunState};

use super::utils::{absolute, confirm, print_summary, run_prompt, shutdown_signal, wait_for_exit, write_readme};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Directory holding everything next to the QuestDB root: venv, notebooks, logs
fn work_dir(settings: &Settings) -> PathBuf {
    settings
        .questdb
        .root
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn jupyter_lab(settings: &Settings, python: &PythonEnv, client: reqwest::Client) -> JupyterLab {
    JupyterLab::new(
        python.script("jupyter-lab"),
        settings.notebook_dir(),
        work_dir(settings).join("jupyterlab.log"),
        &settings.jupyter,
        client,
    )
}

fn record_state(mode: LaunchMode, settings: &Settings, supervisor: &Supervisor) -> Result<PathBuf> {
    let path = Layout::new(&settings.questdb.root).state_path();
    let mut state = RunState::new(mode, settings.questdb.root.clone(), &settings.ports());
    state.questdb_pid = supervisor.pid_of(questdb::SERVICE_NAME);
    state.jupyter_pid = supervisor.pid_of(jupyter::SERVICE_NAME);
    state.save(&path)?;
    Ok(path)
}

/// Fetch the default notebook unless the notebooks come from a local directory
async fn ensure_default_notebook(client: &reqwest::Client, settings: &Settings, local: bool) -> Result<()> {
    let notebook_dir = settings.notebook_dir();
    let notebook = notebook_dir.join(&settings.jupyter.default_notebook);
    if local {
        if !notebook.exists() {
            warn!("{} not found among the local notebooks", notebook.display());
        }
        return Ok(());
    }
    std::fs::create_dir_all(&notebook_dir)?;
    notebook::fetch_default(client, &settings.jupyter.notebook_url, &notebook).await?;
    Ok(())
}

/// Throwaway playground: everything lives in a temporary directory removed on exit
pub async fn run(settings: Settings, yes: bool, local_notebooks: Option<PathBuf>) -> Result<()> {
    let mut settings = settings;
    settings.jupyter.bind_address = "127.0.0.1".to_string();
    settings.jupyter.open_browser = true;

    if !yes {
        println!("{}", run_prompt(&settings));
        if !confirm("Continue?").await? {
            anyhow::bail!("Aborted");
        }
    }

    let (java, java_version) = require_java(settings.questdb.java_home.as_deref()).await?;

    let tmpdir = tempfile::Builder::new().prefix("questplay_").tempdir()?;
    println!("Created temporary directory: {}", tmpdir.path().display());
    write_readme(tmpdir.path())?;

    let mut settings = settings.with_root(tmpdir.path().join("questdb"));
    let local = local_notebooks.is_some();
    settings.jupyter.notebook_dir = Some(match local_notebooks {
        Some(dir) => dir.canonicalize()?,
        None => tmpdir.path().join("notebooks"),
    });
    validate_configuration(&settings, false)?;

    let result = run_in(&settings, java, java_version, tmpdir.path(), local).await;

    let path = tmpdir.path().to_path_buf();
    match tmpdir.close() {
        Ok(()) => println!("Deleted temporary directory: {}", path.display()),
        Err(e) => warn!("Could not delete {}: {}", path.display(), e),
    }
    result
}

async fn run_in(
    settings: &Settings,
    java: PathBuf,
    java_version: JavaVersion,
    tmpdir: &Path,
    local_notebooks: bool,
) -> Result<()> {
    let client = http::client()?;
    let layout = Layout::new(&settings.questdb.root);
    let installer = Installer::new(client.clone(), &settings.questdb, layout);
    let python = PythonEnv::from_settings(&settings.python, tmpdir);
    let mut questdb = QuestDb::new(java, java_version, &settings.questdb, client.clone());

    // QuestDB downloads and boots while pip runs
    let start_questdb = async {
        installer.install().await?;
        questdb::prepare(&settings.questdb, &settings.volumes.extra)?;
        questdb.start().await
    };
    let setup_python = python.setup(&settings.python.packages);
    let started = tokio::try_join!(start_questdb, setup_python);
    if let Err(e) = started {
        let _ = questdb.stop().await;
        return Err(e.into());
    }

    ensure_default_notebook(&client, settings, local_notebooks).await?;

    let endpoints = questdb.endpoints("localhost");
    let lab = jupyter_lab(settings, &python, client);
    let lab_url = lab.url("localhost");

    let mut supervisor = Supervisor::new();
    supervisor.adopt(Box::new(questdb));
    supervisor.add(Box::new(lab));
    supervisor.start_all().await?;

    let state_path = record_state(LaunchMode::Run, settings, &supervisor)?;
    print_summary(&lab_url, &endpoints);

    let waited = wait_for_exit("Press Enter to stop QuestDB and exit.").await;
    supervisor.stop_all().await;
    RunState::clear(&state_path)?;
    waited
}

/// Install everything `serve` needs; meant for the image build
pub async fn provision(settings: Settings, notebooks: Option<PathBuf>, skip_pip: bool) -> Result<()> {
    validate_configuration(&settings, false)?;

    let client = http::client()?;
    let layout = questdb::prepare(&settings.questdb, &settings.volumes.extra)?;
    Installer::new(client.clone(), &settings.questdb, layout).install().await?;

    if skip_pip {
        info!("Skipping Python packages");
    } else {
        PythonEnv::from_settings(&settings.python, &work_dir(&settings))
            .setup(&settings.python.packages)
            .await?;
    }

    match notebooks {
        Some(src) => {
            let notebook_dir = settings.notebook_dir();
            let copied = notebook::copy_assets(&src, &notebook_dir)?;
            info!("Copied {} notebook files to {}", copied, notebook_dir.display());
        }
        None => ensure_default_notebook(&client, &settings, false).await?,
    }

    println!("✓ Provisioned QuestDB {} at {}", settings.questdb.version, settings.questdb.root.display());
    Ok(())
}

/// Container entry point: run both services until told to stop
pub async fn serve(settings: Settings) -> Result<()> {
    validate_configuration(&settings, false)?;

    let layout = questdb::prepare(&settings.questdb, &settings.volumes.extra)?;
    if !layout.is_installed() {
        anyhow::bail!(
            "QuestDB is not installed at {}; run `questplay provision` first",
            layout.root.display()
        );
    }

    let (java, java_version) = require_java(settings.questdb.java_home.as_deref()).await?;
    let client = http::client()?;
    let python = PythonEnv::from_settings(&settings.python, &work_dir(&settings));

    let questdb = QuestDb::new(java, java_version, &settings.questdb, client.clone());
    let endpoints = questdb.endpoints("localhost");
    let lab = jupyter_lab(&settings, &python, client);
    let lab_url = lab.url("localhost");

    let mut supervisor = Supervisor::new();
    supervisor.add(Box::new(questdb));
    supervisor.add(Box::new(lab));
    supervisor.start_all().await?;

    let state_path = record_state(LaunchMode::Serve, &settings, &supervisor)?;
    print_summary(&lab_url, &endpoints);

    let waited = shutdown_signal().await;
    info!("Shutting down");
    supervisor.stop_all().await;
    RunState::clear(&state_path)?;
    waited
}

/// Probe the service ports and compare server.conf with the settings
pub async fn check(settings: Settings, host: String) -> Result<()> {
    let mut failures = 0;
    let layout = Layout::new(&settings.questdb.root);

    match RunState::load_from_path(&layout.state_path()) {
        Ok(Some(state)) => println!(
            "Started {} ({:?}), questdb pid {}, jupyter pid {}",
            state.started_at.to_rfc3339(),
            state.mode,
            state.questdb_pid.map_or("-".to_string(), |p| p.to_string()),
            state.jupyter_pid.map_or("-".to_string(), |p| p.to_string()),
        ),
        Ok(None) => println!("No run state recorded under {}", layout.root.display()),
        Err(e) => warn!("Ignoring run state: {}", e),
    }

    let expected = ServerConf::from_settings(&settings.questdb, &layout);
    match ServerConf::read(&layout.server_conf_path()) {
        Ok(actual) => {
            let missing = expected.missing_from(&actual);
            if missing.is_empty() {
                println!("✓ server.conf has all {} expected entries", expected.len());
            } else {
                for (key, value) in missing {
                    println!("✗ server.conf: expected {}={}", key, value);
                    failures += 1;
                }
            }
        }
        Err(e) => {
            println!("✗ server.conf: {}", e);
            failures += 1;
        }
    }

    for report in probe::probe_ports(&host, &settings.ports(), PROBE_TIMEOUT).await {
        if report.open {
            println!("✓ {} port {} is open", report.name, report.port);
        } else {
            println!("✗ {} port {} is closed", report.name, report.port);
            failures += 1;
        }
    }

    let client = http::client()?;
    let url = format!("http://{}:{}/", host, settings.questdb.http_port);
    if probe::http_ok(&client, Method::HEAD, &url, PROBE_TIMEOUT).await {
        println!("✓ QuestDB HTTP answers at {}", url);
    } else {
        println!("✗ QuestDB HTTP does not answer at {}", url);
        failures += 1;
    }

    if failures > 0 {
        error!("{} check(s) failed", failures);
        anyhow::bail!("{} check(s) failed", failures);
    }
    Ok(())
}

/// Render the default notebook to `<output_dir>/index.html`
pub async fn export(settings: Settings, output_dir: Option<PathBuf>) -> Result<()> {
    let notebook_dir = settings.notebook_dir();
    let output_dir = output_dir.unwrap_or_else(|| {
        notebook_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    // nbconvert runs inside the notebook directory
    let output_dir = absolute(&output_dir)?;
    std::fs::create_dir_all(&output_dir)?;

    let python = PythonEnv::from_settings(&settings.python, &work_dir(&settings));
    notebook::export_html(
        &python.script("jupyter"),
        &notebook_dir,
        &settings.jupyter.default_notebook,
        &output_dir,
    )
    .await?;

    println!("✓ Exported {}", output_dir.join("index.html").display());
    Ok(())
}

/// Initialize default configuration
pub async fn init(force: bool) -> Result<()> {
    let config_path = Settings::config_path();

    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml_content = Settings::default().to_toml()?;
    std::fs::write(&config_path, toml_content)?;

    println!("✓ Configuration initialized at {:?}", config_path);
    Ok(())
}

/// Manage configuration (show, validate)
pub async fn config(settings: Settings, show: bool, validate: bool) -> Result<()> {
    if show {
        println!("{}", settings.to_toml()?);
    }

    if validate {
        match validate_configuration(&settings, settings.questdb.strict_validation) {
            Ok(()) => println!("✓ Configuration is valid"),
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}

/// Show version information
pub async fn version() -> Result<()> {
    println!("questplay {}", env!("CARGO_PKG_VERSION"));
    println!("Built with Rust {}", rustc_version::version()?);
    Ok(())
}
