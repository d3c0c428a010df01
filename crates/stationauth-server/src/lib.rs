//! HTTP front door, allowlist service and process wiring for StationAuth.
//!
//! The `stationauth-server` binary serves the API; with an in-memory queue
//! it also runs the worker in-process. The `stationauth-worker` binary
//! consumes the shared Redis queue on its own.

pub mod allowlist;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod redis_pool;
pub mod runtime;
pub mod server;

pub use allowlist::{AllowlistAccessControl, AllowlistStore, InMemoryAllowlist, RedisAllowlist};
pub use config::AppConfig;
pub use error::{AllowlistError, ServerError};
pub use redis_pool::create_redis_pool;
pub use runtime::{build_allowlist, build_processor, run_server, run_worker};
pub use server::{AppState, ServerBuilder, StationAuthServer, build_app, shutdown_signal};
