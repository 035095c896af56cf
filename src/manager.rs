//! The token manager.
//!
//! [`TokenManager::get`] hands out a usable access token for an audience. The
//! common case is a read of the credential store under a shared lock. When the
//! cached token is missing, expiring, or a refresh is forced, one caller takes
//! the exclusive lock and acquires a new token while the others wait; after
//! the lock is released they find the new token and return it without
//! touching the network.
//!
//! # Example
//!
//! ```ignore
//! use chainguard_provider_auth::{LoginConfig, TokenManager};
//!
//! let manager = TokenManager::with_defaults()?;
//! let cfg = LoginConfig::new("https://console-api.enforce.dev");
//! let token = manager.get(&cfg, false).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::LoginConfig;
use crate::error::TokenError;
use crate::exchange::{bearer_metadata, ExchangeOptions, GrpcTokenExchange, TokenExchange};
use crate::login::{BrowserLogin, LocalBrowserLogin, LoginOptions};
use crate::store::{FileTokenStore, TokenStore};
use crate::strategy::Strategy;
use crate::types::{TokenKind, TokenPair, LOGIN_TIMEOUT, REFRESH_BUFFER};

/// Produces valid access tokens, acquiring and persisting new ones as needed.
///
/// Construct one per host process and share it (e.g. behind an [`Arc`]) with
/// every resource and data source. A single reader/writer lock serializes all
/// acquisitions, across audiences, so at most one network authentication is
/// in flight at a time.
pub struct TokenManager {
    lock: RwLock<()>,
    store: Arc<dyn TokenStore>,
    exchange: Arc<dyn TokenExchange>,
    login: Arc<dyn BrowserLogin>,
    login_timeout: Duration,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("login_timeout", &self.login_timeout)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Create a manager over the given collaborators.
    pub fn new(
        store: Arc<dyn TokenStore>,
        exchange: Arc<dyn TokenExchange>,
        login: Arc<dyn BrowserLogin>,
    ) -> Self {
        Self {
            lock: RwLock::new(()),
            store,
            exchange,
            login,
            login_timeout: LOGIN_TIMEOUT,
        }
    }

    /// Create a manager using the on-disk cache, the gRPC exchange service,
    /// and the system browser.
    pub fn with_defaults() -> Result<Self, TokenError> {
        Ok(Self::new(
            Arc::new(FileTokenStore::new()?),
            Arc::new(GrpcTokenExchange::new()),
            Arc::new(LocalBrowserLogin::new()),
        ))
    }

    /// Override the bound on the interactive login.
    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// The credential store backing this manager.
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Get an access token for `config.audience`.
    ///
    /// Returns the cached token if it outlives [`REFRESH_BUFFER`] and
    /// `force_refresh` is false. Otherwise a new token is acquired and
    /// persisted first. Dropping the returned future abandons an in-flight
    /// acquisition without persisting anything.
    #[instrument(skip(self, config), fields(audience = %config.audience))]
    pub async fn get(&self, config: &LoginConfig, force_refresh: bool) -> Result<Vec<u8>, TokenError> {
        let observed = {
            let _guard = self.lock.read().await;
            let life = self
                .store
                .remaining_life(TokenKind::Access, &config.audience, REFRESH_BUFFER)
                .await;
            if life > Duration::ZERO && !force_refresh {
                debug!(remaining_secs = life.as_secs(), "Using cached token");
                return self.store.load(TokenKind::Access, &config.audience).await;
            }
            life
        };

        self.refresh(config, observed).await?;

        let _guard = self.lock.read().await;
        self.store.load(TokenKind::Access, &config.audience).await
    }

    /// Attach a bearer token for `config.audience` to a platform API request.
    pub async fn authorize<T>(
        &self,
        config: &LoginConfig,
        mut request: tonic::Request<T>,
    ) -> Result<tonic::Request<T>, TokenError> {
        let token = self.get(config, false).await?;
        let value = std::str::from_utf8(&token)
            .ok()
            .and_then(bearer_metadata)
            .ok_or_else(|| TokenError::Store("cached token is not a valid header value".to_string()))?;
        request.metadata_mut().insert("authorization", value);
        Ok(request)
    }

    /// Acquire and persist a new token unless another caller already has.
    ///
    /// `observed` is the remaining life the caller saw before deciding to
    /// refresh.
    async fn refresh(&self, config: &LoginConfig, observed: Duration) -> Result<(), TokenError> {
        let _guard = self.lock.write().await;

        let life = self
            .store
            .remaining_life(TokenKind::Access, &config.audience, REFRESH_BUFFER)
            .await;
        if life > observed {
            debug!(remaining_secs = life.as_secs(), "Token refreshed by another caller");
            return Ok(());
        }

        if config.disabled {
            warn!("Automatic login is disabled and no valid token is cached");
            return Err(TokenError::Unauthenticated(format!(
                "automatic login is disabled and no valid token is cached for {}",
                config.audience
            )));
        }

        let pair = self
            .acquire(config)
            .await
            .map_err(|e| TokenError::AcquisitionFailed(e.to_string()))?;
        self.persist(config, &pair).await
    }

    /// Try each planned strategy until one succeeds or one that cannot fall
    /// through fails.
    async fn acquire(&self, config: &LoginConfig) -> Result<TokenPair, TokenError> {
        for strategy in Strategy::plan(config) {
            debug!(strategy = strategy.name(), "Attempting token acquisition");
            match self.run(&strategy, config).await {
                Ok(pair) => {
                    info!(
                        strategy = strategy.name(),
                        refresh_token = pair.has_refresh_token(),
                        "Acquired token"
                    );
                    return Ok(pair);
                },
                Err(e) if strategy.falls_through() => {
                    warn!(strategy = strategy.name(), error = %e, "Token acquisition failed, falling back");
                },
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "Token acquisition failed");
                    return Err(e);
                },
            }
        }
        Err(TokenError::AcquisitionFailed(
            "no acquisition strategy applies".to_string(),
        ))
    }

    async fn run(&self, strategy: &Strategy, config: &LoginConfig) -> Result<TokenPair, TokenError> {
        match strategy {
            Strategy::RefreshToken => {
                let cached = self.store.load(TokenKind::Refresh, &config.audience).await?;
                let refresh_token = String::from_utf8(cached).map_err(|_| {
                    TokenError::Store("cached refresh token is not valid UTF-8".to_string())
                })?;
                self.exchange
                    .refresh(
                        &config.issuer,
                        &config.audience,
                        refresh_token.trim(),
                        &config.user_agent,
                    )
                    .await
            },
            Strategy::DirectExchange(identity_token) => {
                let identity_token = identity_token.resolve().await?;
                let options = ExchangeOptions::default()
                    .with_user_agent(config.user_agent.clone())
                    .with_identity(config.identity.clone());
                self.exchange
                    .exchange_pair(&config.issuer, &config.audience, &identity_token, options)
                    .await
            },
            Strategy::InteractiveLogin => {
                let options = LoginOptions {
                    issuer: config.issuer.clone(),
                    audience: vec![config.audience.clone()],
                    client_id: config.client_id.clone(),
                    identity: config.identity.clone(),
                    identity_provider: config.identity_provider.clone(),
                    social_connection: config.social_connection.clone(),
                    org_name: config.org_name.clone(),
                    create_refresh_token: config.use_refresh_tokens,
                };
                match tokio::time::timeout(self.login_timeout, self.login.login(options)).await {
                    Ok(result) => result,
                    Err(_) => Err(TokenError::DeadlineExceeded(format!(
                        "browser login did not complete within {}s",
                        self.login_timeout.as_secs_f64()
                    ))),
                }
            },
        }
    }

    async fn persist(&self, config: &LoginConfig, pair: &TokenPair) -> Result<(), TokenError> {
        self.store
            .save(pair.access_token.as_bytes(), TokenKind::Access, &config.audience)
            .await
            .map_err(|e| TokenError::PersistenceFailed(format!("saving access token: {}", e)))?;
        if pair.has_refresh_token() {
            self.store
                .save(pair.refresh_token.as_bytes(), TokenKind::Refresh, &config.audience)
                .await
                .map_err(|e| TokenError::PersistenceFailed(format!("saving refresh token: {}", e)))?;
        }
        Ok(())
    }
}
