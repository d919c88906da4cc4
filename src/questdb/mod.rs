//! QuestDB: install layout, server.conf and the managed server process.

pub mod install;
pub mod layout;
pub mod server_conf;

use async_trait::async_trait;
use reqwest::Method;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::config::QuestDbSettings;
use crate::java::JavaVersion;
use crate::probe;
use crate::process::{retry, ChildProcess, RetryPolicy, Service};
use crate::{PlayError, PlayResult};

pub use install::Installer;
pub use layout::Layout;
pub use server_conf::ServerConf;

pub const SERVICE_NAME: &str = "questdb";

/// JVM and server arguments for launching QuestDB as a Java module
pub fn launch_args(version: JavaVersion, layout: &Layout) -> Vec<String> {
    // ParallelOldGC was folded into ParallelGC in Java 15
    let gc_flag = if version.major >= 15 {
        "-XX:+UseParallelGC"
    } else {
        "-XX:+UseParallelOldGC"
    };

    vec![
        "-DQuestDB-Runtime-0".to_string(),
        "-ea".to_string(),
        "-Debug".to_string(),
        "-XX:+UnlockExperimentalVMOptions".to_string(),
        "-XX:+AlwaysPreTouch".to_string(),
        gc_flag.to_string(),
        "-p".to_string(),
        layout.jar_path().display().to_string(),
        "-m".to_string(),
        "io.questdb/io.questdb.ServerMain".to_string(),
        "-d".to_string(),
        layout.data.display().to_string(),
    ]
}

/// Connection details printed once QuestDB is up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub web_console: String,
    pub psql: String,
    pub ilp_port: u16,
}

pub struct QuestDb {
    java: PathBuf,
    java_version: JavaVersion,
    layout: Layout,
    http_port: u16,
    pg_port: u16,
    ilp_port: u16,
    startup_timeout: Duration,
    client: reqwest::Client,
    process: Option<ChildProcess>,
}

impl QuestDb {
    pub fn new(
        java: PathBuf,
        java_version: JavaVersion,
        settings: &QuestDbSettings,
        client: reqwest::Client,
    ) -> Self {
        Self {
            java,
            java_version,
            layout: Layout::new(&settings.root),
            http_port: settings.http_port,
            pg_port: settings.pg_port,
            ilp_port: settings.ilp_port,
            startup_timeout: Duration::from_secs(settings.startup_timeout_sec),
            client,
            process: None,
        }
    }

    pub fn endpoints(&self, host: &str) -> Endpoints {
        endpoints(host, self.http_port, self.pg_port, self.ilp_port)
    }

    fn health_url(&self) -> String {
        format!("http://localhost:{}/", self.http_port)
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
        Ok(probe::http_ok(&self.client, Method::HEAD, &self.health_url(), Duration::from_secs(1)).await)
    }
}

pub fn endpoints(host: &str, http_port: u16, pg_port: u16, ilp_port: u16) -> Endpoints {
    Endpoints {
        web_console: format!("http://{}:{}/", host, http_port),
        psql: format!("psql -h {} -p {} -U admin -d qdb", host, pg_port),
        ilp_port,
    }
}

#[async_trait]
impl Service for QuestDb {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    async fn start(&mut self) -> PlayResult<()> {
        if !self.layout.is_installed() {
            return Err(PlayError::configuration(format!(
                "QuestDB is not installed at {}",
                self.layout.root.display()
            )));
        }

        let args = launch_args(self.java_version, &self.layout);
        info!("Starting QuestDB: {} {}", self.java.display(), args.join(" "));
        self.process = Some(ChildProcess::spawn(
            &self.java,
            &args,
            &self.layout.data,
            &self.layout.log_path(),
        )?);

        info!("Waiting until QuestDB HTTP service is up");
        let policy = RetryPolicy::with_timeout(self.startup_timeout);
        let msg = format!("QuestDB HTTP service did not come up on port {}", self.http_port);
        retry(&policy, &msg, self, QuestDb::poll_ready).await
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

impl QuestDb {
    fn poll_ready(&mut self) -> futures::future::BoxFuture<'_, PlayResult<bool>> {
        Box::pin(self.is_up())
    }
}

/// Create the directory layout and (re)write server.conf. Returns the layout.
pub fn prepare(settings: &QuestDbSettings, extra_volumes: &[PathBuf]) -> PlayResult<Layout> {
    let layout = Layout::new(&settings.root);
    layout.ensure(extra_volumes)?;

    let conf = ServerConf::from_settings(settings, &layout);
    let path = layout.server_conf_path();
    conf.write(&path)?;
    info!("Wrote {} ({} entries)", path.display(), conf.len());
    Ok(layout)
}
