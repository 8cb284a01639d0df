use payni_gateway::api::{build_router, AppState};
use payni_gateway::config::AppConfig;
use payni_gateway::database::repository::TransactionStore;
use payni_gateway::database::transaction_repository::TransactionRepository;
use payni_gateway::database::init_pool_from_config;
use payni_gateway::logging::init_tracing_with;
use payni_gateway::payments::PaymentProviderFactory;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing_with(&config.logging);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting payni gateway"
    );

    let store: Option<Arc<dyn TransactionStore>> = match init_pool_from_config(&config.database)
        .await
    {
        Ok(Some(pool)) => {
            info!(
                max_connections = pool.options().get_max_connections(),
                "Database connection pool initialized"
            );
            Some(Arc::new(TransactionRepository::new(pool)))
        }
        Ok(None) => {
            warn!("DATABASE_URL not set, webhook payments will not be stored");
            None
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let providers = PaymentProviderFactory::from_env()?;
    info!(
        providers = ?providers.list_available_providers(),
        "Payment providers loaded"
    );

    let app = build_router(AppState::new(providers, store), &config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
