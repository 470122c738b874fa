//! Binary entry point: load env config, provision ingest endpoints, then
//! supervise one ffmpeg pipeline per provisioned target until shutdown.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use streamvisor::provision::pair_pipelines;
use streamvisor::{Config, FfmpegCommand, GraphClient, LogWriter, Supervisor};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "configuration error");
            return ExitCode::FAILURE;
        }
    };

    info!(count = cfg.create_count, "provisioning ingest endpoints");
    let client = GraphClient::new(cfg.access_token.clone(), &cfg.api_version);
    let lives = client.provision(cfg.create_count).await;

    let builder = FfmpegCommand {
        binary: cfg.ffmpeg_path.clone(),
        copy_codecs: cfg.copy_codecs,
    };
    let specs = pair_pipelines(&cfg.sources, &lives, &builder);
    if specs.is_empty() {
        error!("no pipelines could be registered, exiting");
        return ExitCode::FAILURE;
    }

    let mut supervisor = Supervisor::new(cfg.supervisor.clone(), vec![Arc::new(LogWriter::new())]);
    for spec in specs {
        info!(
            pipeline = %spec.name,
            source = %spec.source,
            target = %spec.target,
            "registered pipeline"
        );
        supervisor.add_pipeline(spec);
    }

    match supervisor.run().await {
        Ok(()) => {
            info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, label = err.as_label(), "supervisor failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("streamvisor=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
