use anyhow::Context;
use clap::Parser;
use doclib::commands::{self, JsonOutput};
use doclib::{logging, Cli};
use doclib_service::DocService;
use tracing::debug;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    let (config, sources) = cli
        .resolve_config()
        .context("failed to load configuration")?;
    debug!(?sources, root = %config.docs_root.display(), "configuration resolved");

    let service = DocService::new(config).context("failed to start document service")?;
    let mut output = JsonOutput::new(std::io::stdout().lock(), cli.pretty);
    commands::execute(&service, cli.command, &mut output).await
}
