pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod http; // HTTP 统计端点
pub mod infra;
pub mod logging;
pub mod lookup;
pub mod server;

pub use config::ServerConfig;
pub use context::{GatewayContext, StatsSnapshot};
pub use error::{Result, ServerError};
pub use handler::{CloseReason, ConnectionHandler};
pub use infra::{AdmissionGate, MetricsCounters, RateBudget};
pub use lookup::{EchoLookup, HttpLookup, LookupService};
pub use server::GatewayServer;
