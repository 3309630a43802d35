//! # Weathervane
//!
//! A minimal reverse proxy that keeps a third-party weather API key out of
//! browser clients: requests to `GET /api` are forwarded server-side with
//! the credential injected, rate limited per client, and cached briefly.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (CORS → Request ID → Trace → Rate Limit)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  /api handler: Response Cache → Forwarding                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  UpstreamClient (credential injection, one GET, no retries) │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Third-party weather API                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything else on the router is a static-file fallback serving the
//! frontend bundle.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use weathervane::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config)?;
//!     let app = build_router(state)?;
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```
//!
//! ## Key Invariant
//!
//! The credential value never appears in a client-visible response body,
//! error payload, or production-mode log line. The only place the full
//! outbound URL is ever logged is a debug diagnostic gated on
//! `APP_ENV != production`, and that gate cannot be influenced by request
//! headers.

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod upstream;

// Re-exports for convenience
pub use cache::ResponseCache;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
pub use upstream::UpstreamClient;
