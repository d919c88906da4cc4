//! CLI utility functions.

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Settings;
use crate::questdb::Endpoints;

/// Load settings (defaults < file < environment), then apply `--root`
pub fn load_settings(config_path: Option<&Path>, root: Option<&Path>) -> Result<Settings> {
    let settings = Settings::load(config_path)?;
    Ok(match root {
        Some(root) => {
            info!("Using QuestDB root {}", root.display());
            settings.with_root(absolute(root)?)
        }
        None => settings,
    })
}

/// Resolve `path` against the current directory
pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Print `prompt` and read one line from stdin. Used for the "press Enter" wait.
///
/// The read happens on a plain thread: a pending tokio stdin read would keep
/// the runtime from shutting down after Ctrl-C.
pub async fn read_line(prompt: &str) -> Result<String> {
    let mut stdout = std::io::stdout();
    stdout.write_all(prompt.as_bytes())?;
    stdout.flush()?;

    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let result = std::io::stdin().read_line(&mut line).map(|_| line);
        let _ = tx.send(result);
    });
    Ok(rx.await??)
}

fn require_terminal(interactive: bool) -> Result<()> {
    if !interactive {
        anyhow::bail!("Cannot ask for confirmation without a terminal; pass --yes to proceed");
    }
    Ok(())
}

/// Ask a yes/no question, defaulting to no
pub async fn confirm(prompt: &str) -> Result<bool> {
    require_terminal(std::io::stderr().is_terminal())?;

    let prompt = prompt.to_string();
    let answer = tokio::task::spawn_blocking(move || {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
    })
    .await??;
    Ok(answer)
}

/// What `run` is about to do, shown before asking for permission
pub fn run_prompt(settings: &Settings) -> String {
    let action = if settings.jupyter.open_browser {
        "Launch JupyterLab in a new browser window."
    } else {
        "Launch JupyterLab."
    };
    format!(
        "\nIn a temporary directory, this will:\n    \
         * Download and run QuestDB {}.\n    \
         * Create a Python virtual environment in the same directory.\n        \
         * `pip install`: {}.\n    \
         * {}\n\n\
         The directory will be automatically deleted when you exit.\n",
        settings.questdb.version,
        settings.python.packages.join(", "),
        action
    )
}

/// Lines announcing the running services
pub fn summary_lines(lab_url: &str, endpoints: &Endpoints) -> Vec<String> {
    vec![
        "QuestDB and JupyterLab are now running...".to_string(),
        format!(" * JupyterLab: {}", lab_url),
        " * QuestDB:".to_string(),
        format!("    * Web Console / REST API: {}", endpoints.web_console),
        format!("    * PSQL: {}  # password: quest", endpoints.psql),
        format!("    * ILP Protocol, port: {}", endpoints.ilp_port),
        String::new(),
        ">>>>> CLICK THE FIRST LINK ABOVE TO OPEN JUPYTERLAB <<<<<".to_string(),
    ]
}

pub fn print_summary(lab_url: &str, endpoints: &Endpoints) {
    println!("\n");
    for line in summary_lines(lab_url, endpoints) {
        println!("{}", line);
    }
    println!();
}

/// Leave a note in a directory the user may stumble upon later
pub fn write_readme(dir: &Path) -> Result<()> {
    let path = dir.join("README.txt");
    std::fs::write(
        &path,
        "Directory and contents created by questplay.\n\
         If you don't recognize this directory, you can safely delete it.\n",
    )?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Resolve when the process is asked to stop (Ctrl-C, or SIGTERM on unix)
pub async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

/// Resolve when the user presses Enter or the process is asked to stop
pub async fn wait_for_exit(prompt: &str) -> Result<()> {
    tokio::select! {
        line = read_line(prompt) => { line?; }
        signal = shutdown_signal() => signal?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questdb::endpoints;
    use tempfile::tempdir;

    #[test]
    fn test_confirmation_needs_a_terminal() {
        let err = require_terminal(false).unwrap_err();
        assert!(err.to_string().contains("--yes"));
        assert!(require_terminal(true).is_ok());
    }

    #[test]
    fn test_absolute_keeps_absolute_paths() {
        assert_eq!(absolute(Path::new("/srv/site")).unwrap(), PathBuf::from("/srv/site"));
        let resolved = absolute(Path::new("site")).unwrap();
        assert_eq!(resolved, std::env::current_dir().unwrap().join("site"));
    }

    #[test]
    fn test_summary_lines() {
        let lines = summary_lines(
            "http://localhost:8888/lab/tree/play.ipynb",
            &endpoints("localhost", 9000, 8812, 9009),
        );

        assert_eq!(lines[1], " * JupyterLab: http://localhost:8888/lab/tree/play.ipynb");
        assert_eq!(lines[3], "    * Web Console / REST API: http://localhost:9000/");
        assert_eq!(
            lines[4],
            "    * PSQL: psql -h localhost -p 8812 -U admin -d qdb  # password: quest"
        );
        assert_eq!(lines[5], "    * ILP Protocol, port: 9009");
    }

    #[test]
    fn test_run_prompt_lists_version_and_packages() {
        let mut settings = Settings::default();
        settings.python.packages = vec!["pandas".to_string(), "questdb".to_string()];
        let prompt = run_prompt(&settings);
        assert!(prompt.contains(&format!("QuestDB {}", settings.questdb.version)));
        assert!(prompt.contains("pandas, questdb"));
    }

    #[test]
    fn test_write_readme() {
        let dir = tempdir().unwrap();
        write_readme(dir.path()).unwrap();
        let text = std::fs::read_to_string(dir.path().join("README.txt")).unwrap();
        assert!(text.contains("safely delete"));
    }

    #[test]
    fn test_load_settings_root_override_is_absolute() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(&config, "[questdb]\nhttp_port = 9100\n").unwrap();

        let settings = load_settings(Some(&config), Some(Path::new("relative/questdb"))).unwrap();
        assert_eq!(settings.questdb.http_port, 9100);
        assert!(settings.questdb.root.is_absolute());
        assert!(settings.questdb.root.ends_with("relative/questdb"));
    }
}
