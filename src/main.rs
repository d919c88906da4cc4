//! QuestPlay - QuestDB + JupyterLab playground launcher.

use anyhow::Result;
use questplay::cli::Cli;
use questplay::config::init_logging;
use questplay::PlayError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.log_level.as_deref())?;

    if let Err(e) = cli.run().await {
        if let Some(play_error) = e.downcast_ref::<PlayError>() {
            eprintln!("Error: {}", play_error.user_message());
            std::process::exit(play_error.exit_code());
        }
        return Err(e);
    }
    Ok(())
}
