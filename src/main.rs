use {
    sqlx::postgres::PgPoolOptions,
    std::{error::Error, sync::Arc, time::Duration},
    storefront_pay::{
        AppState,
        adapters::{mock::MockProvider, stripe::StripeProvider},
        config::Config,
        domain::provider::ProviderRegistry,
        transport::http::router,
    },
    tokio::signal,
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let mut providers = ProviderRegistry::new(Arc::new(StripeProvider::new(config.stripe.clone())));
    if let Some(mock) = &config.mock {
        tracing::warn!("mock payment provider enabled");
        providers = providers.with(Arc::new(MockProvider::new(mock.webhook_secret.clone())));
    }

    let state = AppState {
        pool,
        providers,
        provider_timeout: config.provider_timeout,
    };

    let app = router(state, config.request_timeout);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl+c: {e}");
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
