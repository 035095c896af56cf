//! Login configuration.
//!
//! A [`LoginConfig`] is an immutable snapshot of how one authentication
//! attempt should behave. The provider builds one from its configuration
//! block on every call to [`TokenManager::get`](crate::TokenManager::get).
//!
//! # Example
//!
//! ```
//! use chainguard_provider_auth::LoginConfig;
//! use serde_json::json;
//!
//! let cfg = LoginConfig::from_provider_config(&json!({
//!     "console_api": "https://console-api.example.com",
//!     "login_options": {
//!         "identity_token": "/var/run/secrets/tokens/oidc",
//!         "enable_refresh_tokens": true
//!     }
//! }))
//! .unwrap();
//!
//! assert_eq!(cfg.audience, "https://console-api.example.com");
//! assert!(cfg.use_refresh_tokens);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TokenError;
use crate::types::{DEFAULT_AUDIENCE, DEFAULT_CLIENT_ID, DEFAULT_ISSUER};

/// Configuration for one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// The API endpoint the token is scoped to.
    pub audience: String,
    /// The OIDC issuer URL.
    pub issuer: String,
    /// Switch off automatic (interactive or exchange) authentication.
    pub disabled: bool,
    /// UIDP of an assumable identity, or empty.
    pub identity: String,
    /// Identity provider override for the browser flow, or empty.
    pub identity_provider: String,
    /// Literal OIDC token or a path to a file holding one, or empty.
    pub identity_token: String,
    /// Social connection used by the browser flow, or empty.
    pub social_connection: String,
    /// Verified organization name used by the browser flow, or empty.
    pub org_name: String,
    /// User agent sent to the token exchange service.
    pub user_agent: String,
    /// Prefer refresh-token exchange before any other strategy.
    pub use_refresh_tokens: bool,
    /// OAuth client ID for the browser flow.
    pub client_id: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            audience: DEFAULT_AUDIENCE.to_string(),
            issuer: DEFAULT_ISSUER.to_string(),
            disabled: false,
            identity: String::new(),
            identity_provider: String::new(),
            identity_token: String::new(),
            social_connection: String::new(),
            org_name: String::new(),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            use_refresh_tokens: false,
            client_id: DEFAULT_CLIENT_ID.to_string(),
        }
    }
}

/// The provider's `login_options` block. Unset attributes arrive as null.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginOptionsBlock {
    disabled: Option<bool>,
    identity_id: Option<String>,
    identity_token: Option<String>,
    identity_provider_id: Option<String>,
    organization_name: Option<String>,
    social_connection: Option<String>,
    enable_refresh_tokens: Option<bool>,
}

/// The subset of the provider configuration relevant to authentication.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderConfigBlock {
    console_api: Option<String>,
    issuer: Option<String>,
    user_agent: Option<String>,
    login_options: Option<LoginOptionsBlock>,
}

impl LoginConfig {
    /// Create a configuration for the given audience with defaults elsewhere.
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            ..Default::default()
        }
    }

    /// Build a configuration from the provider's configuration block.
    ///
    /// Absent or null attributes fall back to defaults. The result is validated.
    pub fn from_provider_config(config: &serde_json::Value) -> Result<Self, TokenError> {
        let block: ProviderConfigBlock = if config.is_null() {
            ProviderConfigBlock::default()
        } else {
            serde_json::from_value(config.clone())?
        };

        let mut cfg = Self::default();
        if let Some(audience) = block.console_api.filter(|s| !s.is_empty()) {
            cfg.audience = audience;
        }
        if let Some(issuer) = block.issuer.filter(|s| !s.is_empty()) {
            cfg.issuer = issuer;
        }
        if let Some(user_agent) = block.user_agent.filter(|s| !s.is_empty()) {
            cfg.user_agent = user_agent;
        }
        if let Some(opts) = block.login_options {
            cfg.disabled = opts.disabled.unwrap_or_default();
            cfg.identity = opts.identity_id.unwrap_or_default();
            cfg.identity_token = opts.identity_token.unwrap_or_default();
            cfg.identity_provider = opts.identity_provider_id.unwrap_or_default();
            cfg.org_name = opts.organization_name.unwrap_or_default();
            cfg.social_connection = opts.social_connection.unwrap_or_default();
            cfg.use_refresh_tokens = opts.enable_refresh_tokens.unwrap_or_default();
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the configuration for values no strategy could work with.
    pub fn validate(&self) -> Result<(), TokenError> {
        check_url("audience", &self.audience)?;
        check_url("issuer", &self.issuer)?;
        if !self.identity_token.is_empty() && !self.social_connection.is_empty() {
            return Err(TokenError::Configuration(
                "identity_token and social_connection are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured identity token, if any.
    pub fn identity_token(&self) -> Option<IdentityToken> {
        if self.identity_token.is_empty() {
            None
        } else {
            Some(IdentityToken::new(self.identity_token.clone()))
        }
    }

    /// Set whether automatic login is disabled.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Set the issuer URL.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set the identity to assume.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Set the identity provider override.
    pub fn with_identity_provider(mut self, identity_provider: impl Into<String>) -> Self {
        self.identity_provider = identity_provider.into();
        self
    }

    /// Set the identity token (literal or path).
    pub fn with_identity_token(mut self, identity_token: impl Into<String>) -> Self {
        self.identity_token = identity_token.into();
        self
    }

    /// Set the social connection.
    pub fn with_social_connection(mut self, connection: impl Into<String>) -> Self {
        self.social_connection = connection.into();
        self
    }

    /// Set the verified organization name.
    pub fn with_org_name(mut self, org_name: impl Into<String>) -> Self {
        self.org_name = org_name.into();
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set whether refresh tokens are requested and used.
    pub fn with_refresh_tokens(mut self, enabled: bool) -> Self {
        self.use_refresh_tokens = enabled;
        self
    }
}

fn check_url(name: &str, value: &str) -> Result<(), TokenError> {
    if value.is_empty() {
        return Err(TokenError::Configuration(format!("{} must not be empty", name)));
    }
    let parsed = url::Url::parse(value)
        .map_err(|e| TokenError::Configuration(format!("{} {:?} is not a URL: {}", name, value, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(TokenError::Configuration(format!(
            "{} must use http or https, got {}",
            name, scheme
        ))),
    }
}

/// An OIDC identity token given either literally or as a file path.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityToken(String);

impl IdentityToken {
    /// Wrap a configured identity token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Produce the token itself.
    ///
    /// If the value names an existing file its trimmed contents are returned,
    /// otherwise the value is the token.
    pub async fn resolve(&self) -> Result<String, TokenError> {
        let path = Path::new(&self.0);
        let is_file = tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if is_file {
            let contents = tokio::fs::read_to_string(path).await?;
            let token = contents.trim();
            if token.is_empty() {
                return Err(TokenError::Configuration(format!(
                    "identity token file {} is empty",
                    path.display()
                )));
            }
            return Ok(token.to_string());
        }
        Ok(self.0.clone())
    }
}

impl std::fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if Path::new(&self.0).is_file() {
            f.debug_tuple("IdentityToken").field(&self.0).finish()
        } else {
            f.debug_tuple("IdentityToken").field(&"<literal>").finish()
        }
    }
}
