use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use contacts_gateway::GatewayBuilder;
use contacts_server::api::AppState;
use contacts_server::api::views::Views;
use contacts_server::config::ContactsConfig;

/// Contacts service HTTP server.
#[derive(Parser, Debug)]
#[command(name = "contacts-server", about = "HTTP server for the contacts service")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "contacts.toml")]
    config: PathBuf,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database tables for the configured backend, then exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    contacts_server::telemetry::init();

    // File, then environment, then CLI; everything is checked before any
    // backend is contacted.
    let mut config = ContactsConfig::load(&cli.config)?;
    config.apply_env()?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if !cli.config.exists() {
        info!(path = %cli.config.display(), "config file not found, using defaults");
    }

    if let Some(Commands::Migrate) = cli.command {
        info!(backend = %config.database.backend, "running database migrations...");
        contacts_server::store_factory::migrate(&config.database).await?;
        info!("migrations complete");
        return Ok(());
    }

    config.validate()?;

    let (contacts, lock) = contacts_server::store_factory::create_store(&config.database).await?;
    let blobs = contacts_server::blob_factory::create_blob_store(&config.blob).await?;
    info!(
        database = %config.database.backend,
        blob = %config.blob.backend,
        "backends initialized"
    );

    let gateway = GatewayBuilder::new()
        .contacts(contacts)
        .blobs(blobs)
        .lock(lock)
        .config(config.gateway.to_gateway_config(&config.photos))
        .build()?;

    let state = AppState {
        gateway: gateway.clone(),
        views: Arc::new(Views::new(&config.photos)?),
        max_body_bytes: config.server.max_body_bytes,
    };
    let app = contacts_server::api::router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "contacts-server listening");

    // Serve with graceful shutdown on SIGINT / SIGTERM.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let started flows finish so none stops between its store calls.
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    info!(
        in_flight = gateway.in_flight(),
        timeout_secs = config.server.shutdown_timeout_seconds,
        "waiting for in-flight contact flows..."
    );
    if tokio::time::timeout(shutdown_timeout, gateway.shutdown())
        .await
        .is_err()
    {
        tracing::warn!(
            in_flight = gateway.in_flight(),
            timeout_secs = config.server.shutdown_timeout_seconds,
            "shutdown timeout exceeded, some contact flows were cut off"
        );
    }

    info!("contacts-server shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
