//! Testing utilities for code that depends on the token manager.
//!
//! The stubs here stand in for the token exchange service and the browser
//! login so a [`TokenManager`](crate::TokenManager) can be exercised without
//! network access or user interaction. Each stub counts its invocations and
//! records its arguments.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chainguard_provider_auth::testing::{fake_jwt, StubExchange, StubLogin};
//! use chainguard_provider_auth::{LoginConfig, MemoryTokenStore, TokenManager, TokenPair};
//!
//! # tokio_test::block_on(async {
//! let login = Arc::new(StubLogin::returning(TokenPair::access_only(fake_jwt(i64::MAX / 2))));
//! let manager = TokenManager::new(
//!     Arc::new(MemoryTokenStore::new()),
//!     Arc::new(StubExchange::failing("offline")),
//!     login.clone(),
//! );
//!
//! manager.get(&LoginConfig::default(), false).await.unwrap();
//! assert_eq!(login.calls(), 1);
//! # });
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::TokenError;
use crate::exchange::{ExchangeOptions, TokenExchange};
use crate::login::{BrowserLogin, LoginOptions};
use crate::types::TokenPair;

/// Build a JWT with a placeholder signature whose only claim is `exp`.
pub fn fake_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "exp": exp }).to_string());
    format!("{}.{}.sig", header, payload)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A [`BrowserLogin`] returning a fixed result.
#[derive(Debug)]
pub struct StubLogin {
    result: Result<TokenPair, String>,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<LoginOptions>>,
}

impl StubLogin {
    /// A login that succeeds with `pair`.
    pub fn returning(pair: TokenPair) -> Self {
        Self::with_result(Ok(pair))
    }

    /// A login that fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_result(Err(message.into()))
    }

    fn with_result(result: Result<TokenPair, String>) -> Self {
        Self {
            result,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of times the login was started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Options of every login started so far.
    pub fn seen(&self) -> Vec<LoginOptions> {
        lock(&self.seen).clone()
    }
}

#[async_trait::async_trait]
impl BrowserLogin for StubLogin {
    async fn login(&self, options: LoginOptions) -> Result<TokenPair, TokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.seen).push(options);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone().map_err(TokenError::Login)
    }
}

/// Arguments of one [`TokenExchange::exchange_pair`] call:
/// issuer, audience, identity token, options.
pub type ExchangeCall = (String, String, String, ExchangeOptions);

/// A [`TokenExchange`] returning fixed results.
#[derive(Debug)]
pub struct StubExchange {
    refresh_result: Result<TokenPair, String>,
    exchange_result: Result<TokenPair, String>,
    refresh_calls: AtomicUsize,
    exchange_calls: AtomicUsize,
    refresh_tokens: Mutex<Vec<String>>,
    exchanges: Mutex<Vec<ExchangeCall>>,
}

impl StubExchange {
    /// An exchange whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            refresh_result: Err(message.clone()),
            exchange_result: Err(message),
            refresh_calls: AtomicUsize::new(0),
            exchange_calls: AtomicUsize::new(0),
            refresh_tokens: Mutex::new(Vec::new()),
            exchanges: Mutex::new(Vec::new()),
        }
    }

    /// Set the result of [`TokenExchange::refresh`].
    pub fn with_refresh(mut self, result: Result<TokenPair, String>) -> Self {
        self.refresh_result = result;
        self
    }

    /// Set the result of [`TokenExchange::exchange_pair`].
    pub fn with_exchange(mut self, result: Result<TokenPair, String>) -> Self {
        self.exchange_result = result;
        self
    }

    /// Number of refresh-token exchanges.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Number of identity-token exchanges.
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented so far.
    pub fn seen_refresh_tokens(&self) -> Vec<String> {
        lock(&self.refresh_tokens).clone()
    }

    /// Identity-token exchanges made so far.
    pub fn seen_exchanges(&self) -> Vec<ExchangeCall> {
        lock(&self.exchanges).clone()
    }
}

#[async_trait::async_trait]
impl TokenExchange for StubExchange {
    async fn refresh(
        &self,
        _issuer: &str,
        _audience: &str,
        refresh_token: &str,
        _user_agent: &str,
    ) -> Result<TokenPair, TokenError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.refresh_tokens).push(refresh_token.to_string());
        self.refresh_result.clone().map_err(TokenError::Exchange)
    }

    async fn exchange_pair(
        &self,
        issuer: &str,
        audience: &str,
        identity_token: &str,
        options: ExchangeOptions,
    ) -> Result<TokenPair, TokenError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.exchanges).push((
            issuer.to_string(),
            audience.to_string(),
            identity_token.to_string(),
            options,
        ));
        self.exchange_result.clone().map_err(TokenError::Exchange)
    }
}
