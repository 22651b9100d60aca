//! Observability setup shared between the binaries: tracing subscriber
//! initialization and the panic hook that routes panics through `tracing`.
pub mod arguments;
pub mod config;
pub mod tracing;

pub use config::Config;
