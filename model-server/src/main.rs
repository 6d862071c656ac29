use anyhow::Context;
use clap::{Parser, Subcommand};
use model_server::{
    api, init_production_logging, init_simple_logging, AppState, CommandPredictor, Config,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

/// Seq2seq model server - checkpoint catalog and prediction gateway
#[derive(Parser, Debug)]
#[command(name = "model-server")]
#[command(about = "Serve trained seq2seq checkpoints over HTTP")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Configuration file (default: ~/.seq2seq/model-server.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Override log level (trace, debug, info, warn, error)
        #[arg(short, long)]
        log_level: Option<String>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Destination (default: ~/.seq2seq/model-server.toml)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            log_level,
        } => serve(config, host, port, log_level).await,
        Commands::InitConfig { path } => {
            init_simple_logging("info")?;
            let path = match path {
                Some(path) => path,
                None => Config::default_path()?,
            };
            Config::default().save(&path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

async fn serve(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    log_level: Option<String>,
) -> anyhow::Result<()> {
    let config_path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let mut config = Config::load_or_default(&config_path)?;
    config.apply_env();
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(level) = log_level {
        config.logging.level = level;
    }
    config.validate()?;

    if config.logging.log_to_file {
        init_production_logging(&config.logging.level, config.logging.log_dir.clone())?;
    } else {
        init_simple_logging(&config.logging.level)?;
    }

    info!("Starting model server");

    let predictor = Arc::new(CommandPredictor::new(
        config.predictor.program.clone(),
        config.predictor.args.clone(),
    ));
    let state = AppState::from_config(&config, predictor)?;
    info!(
        experiment_root = %state.experiment_root.display(),
        predictor = %config.predictor.program,
        top_n = config.predictor.top_n,
        timeout_secs = config.predictor.timeout_secs,
        "Experiment loaded"
    );

    let app = api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(address = %addr, "Model server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Model server shut down");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
