//! Waypoint client - authenticated HTTP access to the Waypoint API
//!
//! Every feature of the app talks to the backend through one [`ApiClient`].
//! The client attaches credentials supplied by the application's auth layer,
//! refreshes expiring sessions exactly once no matter how many requests are
//! waiting, retries server errors with backoff, and reports every failure as
//! an [`ApiError`] with a stable `status`/`code`/`message`/`data` shape.
//!
//! # Example
//!
//! ```no_run
//! use waypoint_client::{ApiClient, ClientConfig, RequestConfig};
//! use serde_json::Value;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new(ClientConfig::from_env()?)?;
//! let trips = client.get::<Value>("/trips", RequestConfig::new()).await?;
//! println!("{}", trips.data);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use http::{
    ApiClient, ApiClientBuilder, ApiError, ApiResponse, AuthError, AuthHandlerRegistry, AuthHandlers,
    ErrorKind, RequestConfig, RetryPolicy, Transport,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
