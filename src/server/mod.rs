//! HTTP server: router wiring, cross-cutting layers, startup and shutdown

pub mod builder;
pub mod middleware;
pub mod router;

pub use builder::{ServerBuilder, ServerError, shutdown_signal};
pub use router::build_router;
