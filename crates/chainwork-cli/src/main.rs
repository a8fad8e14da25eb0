use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chainwork_core::ChainConfig;
use chainwork_core::app::App;
use chainwork_core::impls::{ConsoleNotices, TracingDisplay};
use chainwork_core::ports::Connectivity;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run the three-stage chain and its notifiers once.
#[derive(Parser)]
#[command(name = "chainwork")]
#[command(about = "Chained background tasks with countdown notifiers")]
struct Cli {
    /// Identifier handed to every stage.
    #[arg(long, default_value = "001")]
    id: String,

    /// TOML config file (defaults are used for missing fields).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stay offline this long before connectivity comes up.
    #[arg(long, value_name = "MS", default_value_t = 0)]
    offline_ms: u64,

    /// Override `tasks.work_ms`.
    #[arg(long, value_name = "MS")]
    work_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chainwork_cli=info,chainwork_core=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ChainConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ChainConfig::default(),
    };
    if let Some(work_ms) = cli.work_ms {
        config.tasks.work_ms = work_ms;
    }

    let connectivity = Arc::new(Connectivity::new(cli.offline_ms == 0));
    let app = App::builder()
        .config(config)
        .display(Arc::new(TracingDisplay))
        .notices(Arc::new(ConsoleNotices))
        .gate(Arc::new(connectivity.gate()))
        .build()?;

    let run = app.start(&cli.id).await?;

    if cli.offline_ms > 0 {
        info!(offline_ms = cli.offline_ms, "waiting for connectivity");
        let connectivity = Arc::clone(&connectivity);
        let offline = Duration::from_millis(cli.offline_ms);
        tokio::spawn(async move {
            tokio::time::sleep(offline).await;
            connectivity.set_connected(true);
            info!("connectivity is back");
        });
    }

    let summary = run.finish().await?;
    println!("{}", summary.to_json_pretty()?);
    Ok(())
}
