//! Token exchange service client.
//!
//! The security token service turns an OIDC identity token into a platform
//! token pair, and renews a pair from a refresh token. [`GrpcTokenExchange`]
//! talks to it over gRPC; anything implementing [`TokenExchange`] can stand
//! in for it.

use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::{debug, instrument};

use crate::error::TokenError;
use crate::generated::security_token_service_client::SecurityTokenServiceClient;
use crate::generated::{ExchangeRefreshTokenRequest, ExchangeRequest};
use crate::types::TokenPair;

/// Options for [`TokenExchange::exchange_pair`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeOptions {
    /// User agent presented to the service.
    pub user_agent: String,
    /// UIDP of an identity to assume, or empty to act as the token's subject.
    pub identity: String,
}

impl ExchangeOptions {
    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the identity to assume.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }
}

/// The token exchange service.
#[async_trait::async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchange a refresh token for a new access/refresh pair.
    async fn refresh(
        &self,
        issuer: &str,
        audience: &str,
        refresh_token: &str,
        user_agent: &str,
    ) -> Result<TokenPair, TokenError>;

    /// Exchange an OIDC identity token for an access/refresh pair.
    async fn exchange_pair(
        &self,
        issuer: &str,
        audience: &str,
        identity_token: &str,
        options: ExchangeOptions,
    ) -> Result<TokenPair, TokenError>;
}

/// [`TokenExchange`] backed by the issuer's gRPC security token service.
///
/// A connection is established per call; exchanges happen at most once per
/// token lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcTokenExchange;

impl GrpcTokenExchange {
    /// Create a new client.
    pub fn new() -> Self {
        Self
    }

    async fn connect(
        &self,
        issuer: &str,
        user_agent: &str,
    ) -> Result<SecurityTokenServiceClient<Channel>, TokenError> {
        let mut endpoint = Endpoint::from_shared(issuer.to_string())?;
        if issuer.starts_with("https://") {
            endpoint = endpoint.tls_config(ClientTlsConfig::new().with_native_roots())?;
        }
        if !user_agent.is_empty() {
            endpoint = endpoint.user_agent(user_agent.to_string())?;
        }
        debug!(issuer = %issuer, "Connecting to security token service");
        let channel = endpoint.connect().await?;
        Ok(SecurityTokenServiceClient::new(channel))
    }
}

/// `authorization` metadata value presenting `token` as a bearer credential.
pub(crate) fn bearer_metadata(token: &str) -> Option<MetadataValue<Ascii>> {
    format!("Bearer {}", token.trim()).parse().ok()
}

/// Wrap `message` in a request carrying `token` as its bearer credential.
fn bearer_request<T>(message: T, token: &str) -> Result<tonic::Request<T>, TokenError> {
    let mut request = tonic::Request::new(message);
    let value = bearer_metadata(token)
        .ok_or_else(|| TokenError::Exchange("token is not a valid header value".to_string()))?;
    request.metadata_mut().insert("authorization", value);
    Ok(request)
}

#[async_trait::async_trait]
impl TokenExchange for GrpcTokenExchange {
    #[instrument(skip(self, refresh_token), name = "sts.refresh")]
    async fn refresh(
        &self,
        issuer: &str,
        audience: &str,
        refresh_token: &str,
        user_agent: &str,
    ) -> Result<TokenPair, TokenError> {
        let mut client = self.connect(issuer, user_agent).await?;
        let request = bearer_request(
            ExchangeRefreshTokenRequest {
                aud: vec![audience.to_string()],
                ..Default::default()
            },
            refresh_token,
        )?;
        let pair: TokenPair = client.exchange_refresh_token(request).await?.into_inner().into();
        if pair.access_token.is_empty() {
            return Err(TokenError::Exchange(
                "refresh response does not contain an access token".to_string(),
            ));
        }
        Ok(pair)
    }

    #[instrument(skip(self, identity_token, options), name = "sts.exchange_pair")]
    async fn exchange_pair(
        &self,
        issuer: &str,
        audience: &str,
        identity_token: &str,
        options: ExchangeOptions,
    ) -> Result<TokenPair, TokenError> {
        let mut client = self.connect(issuer, &options.user_agent).await?;
        let request = bearer_request(
            ExchangeRequest {
                aud: vec![audience.to_string()],
                identity: options.identity,
                include_refresh_token: true,
                ..Default::default()
            },
            identity_token,
        )?;
        let pair: TokenPair = client.exchange(request).await?.into_inner().into();
        if pair.access_token.is_empty() {
            return Err(TokenError::Exchange(
                "exchange response does not contain an access token".to_string(),
            ));
        }
        Ok(pair)
    }
}
