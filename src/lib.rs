//! Dynamic Mock Server
//!
//! A local HTTP server that impersonates arbitrary endpoints. Mocks are
//! registered at runtime through a small JSON admin API, and recent traffic
//! is kept in memory for inspection.
//!
//! # Features
//!
//! - **Runtime Registration**: Add, replace, and delete mocks over HTTP
//! - **Exact Routing**: Match by exact path and method, nothing more
//! - **Request Logs**: Last 1000 request/response cycles, newest first
//! - **Control Panel**: Browser UI at `/__mock/ui`
//! - **Tunnel**: Optionally expose the server through `vk-tunnel`
//!
//! # Admin API
//!
//! ```text
//! GET    /__mock/list         registered mocks, path -> method -> response
//! POST   /__mock/add          {"method", "path", "response": {"status_code", "headers", "body"}}
//! DELETE /__mock/delete       {"method", "path"}
//! GET    /__mock/logs         request logs, newest first
//! DELETE /__mock/logs/clear   drop all logs
//! ```

pub mod config;
pub mod error;
pub mod interceptor;
pub mod registry;
pub mod request_log;
pub mod server;
pub mod tunnel;
pub mod ui;

pub use config::{MockResponse, MockRoute, MockServerConfig};
pub use error::{ApiError, RegistryError};
pub use interceptor::RequestLogLayer;
pub use registry::MockRegistry;
pub use request_log::{RequestLogEntry, RequestLogStore};
pub use server::MockServer;
pub use tunnel::{TunnelConfig, TunnelLauncher, VkTunnelLauncher};
