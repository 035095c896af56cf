//! Chainguard Provider Auth
//!
//! Token lifecycle management for the Chainguard Terraform provider. Every
//! resource and data source authenticates platform API calls with a bearer
//! token obtained from a shared [`TokenManager`].
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **TokenManager**: hands out cached access tokens and acquires new ones
//!   when they expire, with one network authentication in flight at a time
//! - **LoginConfig**: the per-call authentication settings, built from the
//!   provider configuration block
//! - **TokenStore**: the persistent credential cache (`FileTokenStore` on
//!   disk, `MemoryTokenStore` in process)
//! - **TokenExchange**: the security token service, with a gRPC client
//! - **BrowserLogin**: the interactive login flow, with a localhost-redirect
//!   implementation
//! - **Logging**: integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use chainguard_provider_auth::{init_logging, LoginConfig, TokenManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let manager = Arc::new(TokenManager::with_defaults()?);
//!     let cfg = LoginConfig::from_provider_config(&serde_json::json!({
//!         "console_api": "https://console-api.enforce.dev",
//!         "login_options": { "enable_refresh_tokens": true }
//!     }))?;
//!
//!     let token = manager.get(&cfg, false).await?;
//!     tracing::info!(bytes = token.len(), "Authenticated");
//!     Ok(())
//! }
//! ```
//!
//! # Acquisition Strategies
//!
//! When the cached access token is missing or within a minute of expiry, the
//! manager tries, in order:
//!
//! 1. **Refresh token** (only with `use_refresh_tokens`): exchange the cached
//!    refresh token. A failure here falls through to the next strategy.
//! 2. **Direct exchange** (when an identity token is configured): exchange the
//!    OIDC token with the security token service.
//! 3. **Interactive login** (otherwise): open the browser, bounded to two
//!    minutes.
//!
//! With `disabled` set, none of these run and `get` fails with
//! [`TokenError::Unauthenticated`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod exchange;
pub mod logging;
pub mod login;
pub mod manager;
pub mod store;
pub mod strategy;
pub mod testing;
pub mod types;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

// Re-export main types at crate root
pub use config::{IdentityToken, LoginConfig};
pub use error::TokenError;
pub use exchange::{ExchangeOptions, GrpcTokenExchange, TokenExchange};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use login::{BrowserLogin, LocalBrowserLogin, LoginOptions};
pub use manager::TokenManager;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use strategy::Strategy;
pub use types::{
    TokenKind, TokenPair, DEFAULT_AUDIENCE, DEFAULT_CLIENT_ID, DEFAULT_ISSUER, LOGIN_TIMEOUT,
    REFRESH_BUFFER,
};

// Re-export async_trait for implementors of the collaborator traits
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use tonic;
pub use tracing;
