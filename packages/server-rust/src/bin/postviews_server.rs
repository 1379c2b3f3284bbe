use clap::Parser;
use postviews_server::telemetry::{init_metrics, init_tracing};
use postviews_server::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    init_metrics(cli.metrics_addr)?;

    postviews_server::server::run(cli).await
}
