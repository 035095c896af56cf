//! Credential types and lifecycle constants.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The kind of a cached credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived bearer token presented on every platform API call.
    Access,
    /// Longer-lived token exchanged for a new access token without user interaction.
    Refresh,
}

impl TokenKind {
    /// File name used for this kind in the on-disk cache.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Access => "oidc-token",
            Self::Refresh => "refresh-token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => f.write_str("access"),
            Self::Refresh => f.write_str("refresh"),
        }
    }
}

/// An access token together with an optional refresh token.
///
/// An empty `refresh_token` means none was issued.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenPair {
    /// The access token.
    pub access_token: String,
    /// The refresh token, empty when none was issued.
    pub refresh_token: String,
}

impl TokenPair {
    /// Create a pair from an access token and a refresh token.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Create a pair carrying only an access token.
    pub fn access_only(access_token: impl Into<String>) -> Self {
        Self::new(access_token, String::new())
    }

    /// Whether a refresh token was issued alongside the access token.
    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

// Tokens are secrets; keep them out of Debug output and therefore out of logs.
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.has_refresh_token())
            .finish()
    }
}

impl From<crate::generated::TokenPair> for TokenPair {
    fn from(proto: crate::generated::TokenPair) -> Self {
        Self {
            access_token: proto.token.map(|t| t.token).unwrap_or_default(),
            refresh_token: proto.refresh_token.map(|t| t.token).unwrap_or_default(),
        }
    }
}

impl From<crate::generated::RawToken> for TokenPair {
    fn from(proto: crate::generated::RawToken) -> Self {
        Self {
            access_token: proto.token,
            refresh_token: proto.refresh_token,
        }
    }
}

/// Minimum remaining lifetime for a cached access token to be used as-is.
pub const REFRESH_BUFFER: Duration = Duration::from_secs(60);

/// Upper bound on the interactive browser login.
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(120);

/// Default OIDC issuer.
pub const DEFAULT_ISSUER: &str = "https://issuer.enforce.dev";

/// Default platform API audience.
pub const DEFAULT_AUDIENCE: &str = "https://console-api.enforce.dev";

/// OAuth client ID presented by the browser login flow.
pub const DEFAULT_CLIENT_ID: &str = "terraform-provider-chainguard";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_kind_file_names() {
        assert_eq!(TokenKind::Access.file_name(), "oidc-token");
        assert_eq!(TokenKind::Refresh.file_name(), "refresh-token");
        assert_eq!(TokenKind::Refresh.to_string(), "refresh");
    }

    #[test]
    fn test_token_pair_debug_redacts_secrets() {
        let pair = TokenPair::new("secret-access", "secret-refresh");
        let debug = format!("{:?}", pair);
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
        assert!(debug.contains("has_refresh_token: true"));
    }

    #[test]
    fn test_token_pair_from_proto() {
        let proto = crate::generated::TokenPair {
            token: Some(crate::generated::RawToken {
                token: "access".to_string(),
                refresh_token: String::new(),
            }),
            refresh_token: None,
        };
        let pair: TokenPair = proto.into();
        assert_eq!(pair.access_token, "access");
        assert!(!pair.has_refresh_token());

        let raw = crate::generated::RawToken {
            token: "a".to_string(),
            refresh_token: "r".to_string(),
        };
        assert_eq!(TokenPair::from(raw), TokenPair::new("a", "r"));
    }

    #[test]
    fn test_lifecycle_constants() {
        assert_eq!(REFRESH_BUFFER, Duration::from_secs(60));
        assert_eq!(LOGIN_TIMEOUT, Duration::from_secs(120));
    }
}
