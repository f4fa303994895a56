pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;
pub mod transport;

use {crate::domain::provider::ProviderRegistry, std::time::Duration};

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub providers: ProviderRegistry,
    pub provider_timeout: Duration,
}
