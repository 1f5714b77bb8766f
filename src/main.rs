use anyhow::{Context, Result};
use pizza_orders::prelude::*;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Timeout for requests to the identity provider's key set endpoint
const JWKS_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal outside local development
    let _ = dotenvy::dotenv();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(Environment::default());
            tracing::error!("{}", e);
            if let ConfigError::MissingVars(names) = &e {
                for name in names {
                    tracing::error!("  - {}", name);
                }
            }
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.environment);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(environment: Environment) {
    let default_filter = if environment.is_development() {
        "pizza_orders=debug,tower_http=debug,info"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: AppConfig) -> Result<()> {
    tracing::info!(
        environment = %config.environment,
        version = env!("CARGO_PKG_VERSION"),
        "starting pizza order service"
    );

    let manager = Arc::new(MongoConnectionManager::new(config.mongodb.clone()));
    if let Err(e) = manager.connect().await {
        tracing::warn!("initial MongoDB connection failed, will retry on first request: {}", e);
    }

    let http = reqwest::Client::builder()
        .timeout(JWKS_HTTP_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let gate = AuthGate::new(
        JwtVerifier::for_domain(&config.auth.domain, &config.auth.audience, http),
        AuthPolicy::from_permissions(config.auth.required_permissions.clone()),
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let served = ServerBuilder::new()
        .with_repository(MongoOrderRepository::new(manager.clone()))
        .with_auth_gate(gate)
        .with_allowed_origins(config.allowed_origins.clone())
        .with_environment(config.environment)
        .serve(&addr)
        .await;

    manager.close().await;
    served.with_context(|| format!("server on {} failed", addr))
}
