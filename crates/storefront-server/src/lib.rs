pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod resolver;
pub mod server;

pub use config::{ApiConfig, AppConfig, AuthConfig, CacheConfig, ServerConfig};
pub use error::ApiError;
pub use gate::{AccessGate, GateError};
pub use observability::init_tracing;
pub use resolver::{ResolveError, Resolver};
pub use server::{AppState, ServerBuilder, StorefrontServer, build_app};
