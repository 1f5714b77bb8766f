//! ServerBuilder for fluent API to build the HTTP server

use super::middleware;
use super::router::build_router;
use crate::config::{DEFAULT_ALLOWED_ORIGINS, Environment};
use crate::core::auth::AuthGate;
use crate::core::service::OrderRepository;
use crate::orders::OrderAppState;
use axum::Router;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

/// Errors raised while building or running the server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0} is required")]
    MissingComponent(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Builder for the order API server
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_repository(InMemoryOrderRepository::new())
///     .with_auth_gate(gate)
///     .with_environment(Environment::Production)
///     .build()?;
/// ```
pub struct ServerBuilder {
    repository: Option<Arc<dyn OrderRepository>>,
    auth_gate: Option<AuthGate>,
    allowed_origins: Vec<String>,
    environment: Environment,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            repository: None,
            auth_gate: None,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|o| o.to_string())
                .collect(),
            environment: Environment::default(),
        }
    }

    /// Set the order repository (required)
    pub fn with_repository(mut self, repository: impl OrderRepository + 'static) -> Self {
        self.repository = Some(Arc::new(repository));
        self
    }

    /// Set an already shared order repository (required)
    pub fn with_shared_repository(mut self, repository: Arc<dyn OrderRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Set the gate protecting administrative routes (required)
    pub fn with_auth_gate(mut self, gate: AuthGate) -> Self {
        self.auth_gate = Some(gate);
        self
    }

    /// Origins allowed to make cross-origin requests
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// Deployment environment (controls request logging and stack exposure)
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Build the final router with every layer applied
    pub fn build(self) -> Result<Router, ServerError> {
        let repository = self
            .repository
            .ok_or(ServerError::MissingComponent("OrderRepository. Call .with_repository()"))?;
        let gate = self
            .auth_gate
            .ok_or(ServerError::MissingComponent("AuthGate. Call .with_auth_gate()"))?;

        let router = build_router(OrderAppState::new(repository), gate);
        Ok(middleware::apply(
            router,
            self.environment,
            &self.allowed_origins,
        ))
    }

    /// Serve the application with graceful shutdown
    ///
    /// Returns once SIGTERM or Ctrl+C has been received and in-flight
    /// requests have completed.
    pub async fn serve(self, addr: &str) -> Result<(), ServerError> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve when the process is asked to stop
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::{AuthPolicy, JwtVerifier, StaticKeyProvider};
    use crate::storage::InMemoryOrderRepository;
    use jsonwebtoken::DecodingKey;

    fn gate() -> AuthGate {
        let keys = StaticKeyProvider::new(DecodingKey::from_secret(b"unused"));
        AuthGate::new(
            JwtVerifier::new(Arc::new(keys), "https://api.test", "https://tenant.test/"),
            AuthPolicy::Authenticated,
        )
    }

    #[test]
    fn test_build_requires_repository() {
        let err = ServerBuilder::new().with_auth_gate(gate()).build().unwrap_err();
        assert!(err.to_string().contains("OrderRepository"));
    }

    #[test]
    fn test_build_requires_auth_gate() {
        let err = ServerBuilder::new()
            .with_repository(InMemoryOrderRepository::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("AuthGate"));
    }

    #[test]
    fn test_build_with_all_components() {
        let result = ServerBuilder::new()
            .with_repository(InMemoryOrderRepository::new())
            .with_auth_gate(gate())
            .with_allowed_origins(vec!["https://pizzeria.test".to_string()])
            .with_environment(Environment::Production)
            .build();
        assert!(result.is_ok());
    }
}
