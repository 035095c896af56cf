//! Persistent credential storage.
//!
//! Credentials are keyed by `(kind, audience)`. The store is the single
//! source of truth for the token manager: a token that was acquired but not
//! saved is never handed to a caller.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde::Deserialize;
use tracing::debug;

use crate::error::TokenError;
use crate::types::TokenKind;

/// Storage for cached credentials.
///
/// Implementations must be safe for concurrent use; the token manager adds no
/// atomicity beyond its own lock.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the token of `kind` for `audience`.
    async fn load(&self, kind: TokenKind, audience: &str) -> Result<Vec<u8>, TokenError>;

    /// Save `token` as the token of `kind` for `audience`, replacing any previous one.
    async fn save(&self, token: &[u8], kind: TokenKind, audience: &str) -> Result<(), TokenError>;

    /// Time left before the stored token comes within `buffer` of its expiry.
    ///
    /// Missing or undecodable tokens have no remaining life.
    async fn remaining_life(&self, kind: TokenKind, audience: &str, buffer: Duration) -> Duration {
        match self.load(kind, audience).await {
            Ok(token) => remaining_life(&token, buffer),
            Err(_) => Duration::ZERO,
        }
    }
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Read the `exp` claim of a JWT without verifying its signature.
///
/// The claim only schedules refreshes.
pub fn expiry(token: &[u8]) -> Option<i64> {
    let token = std::str::from_utf8(token).ok()?.trim();
    let header = decode_header(token).ok()?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()?
        .claims
        .exp
}

/// Time until `exp - buffer` for a JWT, saturating at zero.
pub fn remaining_life(token: &[u8], buffer: Duration) -> Duration {
    let Some(exp) = expiry(token) else {
        return Duration::ZERO;
    };
    let buffer = i64::try_from(buffer.as_secs()).unwrap_or(i64::MAX);
    let left = exp
        .saturating_sub(Utc::now().timestamp())
        .saturating_sub(buffer);
    if left <= 0 {
        Duration::ZERO
    } else {
        Duration::from_secs(left as u64)
    }
}

/// On-disk token cache.
///
/// Layout: `<root>/<sanitized audience>/<kind file name>`, where the default
/// root is `chainguard` under the user's cache directory. Shared by every
/// process running as the same user.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    root: PathBuf,
}

impl FileTokenStore {
    /// Create a store under the user's cache directory.
    pub fn new() -> Result<Self, TokenError> {
        let base = dirs::cache_dir().ok_or_else(|| {
            TokenError::Store("unable to determine the user cache directory".to_string())
        })?;
        Ok(Self::with_root(base.join("chainguard")))
    }

    /// Create a store rooted at a specific directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory of the cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding the token of `kind` for `audience`.
    pub fn path(&self, kind: TokenKind, audience: &str) -> PathBuf {
        self.root.join(sanitize(audience)).join(kind.file_name())
    }
}

/// Turn an audience URL into a single path component.
fn sanitize(audience: &str) -> String {
    let trimmed = audience
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Replace `path` with `token` so that readers in other processes never
/// observe a partially written file.
fn write_atomically(path: &Path, token: &[u8]) -> Result<(), TokenError> {
    let dir = path
        .parent()
        .ok_or_else(|| TokenError::Store(format!("invalid cache path {}", path.display())))?;
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(token)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))?;
    }

    tmp.persist(path).map_err(|e| TokenError::Io(e.error))?;
    Ok(())
}

#[async_trait::async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self, kind: TokenKind, audience: &str) -> Result<Vec<u8>, TokenError> {
        let path = self.path(kind, audience);
        tokio::fs::read(&path).await.map_err(|e| {
            TokenError::Store(format!("reading {} token {}: {}", kind, path.display(), e))
        })
    }

    async fn save(&self, token: &[u8], kind: TokenKind, audience: &str) -> Result<(), TokenError> {
        let path = self.path(kind, audience);
        let target = path.clone();
        let token = token.to_vec();
        tokio::task::spawn_blocking(move || write_atomically(&target, &token))
            .await
            .map_err(|e| TokenError::Store(format!("token writer task failed: {}", e)))??;
        debug!(kind = %kind, path = %path.display(), "Saved token");
        Ok(())
    }
}

/// In-process token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<(TokenKind, String), Vec<u8>>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a token directly, e.g. to seed a cache in tests.
    pub fn insert(&self, kind: TokenKind, audience: &str, token: impl Into<Vec<u8>>) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert((kind, audience.to_string()), token.into());
        }
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self, kind: TokenKind, audience: &str) -> Result<Vec<u8>, TokenError> {
        let tokens = self
            .tokens
            .lock()
            .map_err(|_| TokenError::Store("token store lock poisoned".to_string()))?;
        tokens
            .get(&(kind, audience.to_string()))
            .cloned()
            .ok_or_else(|| TokenError::Store(format!("no {} token for {}", kind, audience)))
    }

    async fn save(&self, token: &[u8], kind: TokenKind, audience: &str) -> Result<(), TokenError> {
        let mut tokens = self
            .tokens
            .lock()
            .map_err(|_| TokenError::Store("token store lock poisoned".to_string()))?;
        tokens.insert((kind, audience.to_string()), token.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_jwt;

    const AUDIENCE: &str = "https://console-api.example.com";

    #[test]
    fn test_expiry_parsing() {
        let token = fake_jwt(1_900_000_000);
        assert_eq!(expiry(token.as_bytes()), Some(1_900_000_000));

        assert_eq!(expiry(b"not-a-jwt"), None);
        assert_eq!(expiry(b"a.!!!.c"), None);
        assert_eq!(expiry(b""), None);
    }

    #[test]
    fn test_remaining_life() {
        let now = Utc::now().timestamp();

        let token = fake_jwt(now + 3600);
        let life = remaining_life(token.as_bytes(), Duration::from_secs(60));
        assert!(life > Duration::from_secs(3500) && life <= Duration::from_secs(3540));

        // Within the buffer counts as no life left.
        let token = fake_jwt(now + 30);
        assert_eq!(remaining_life(token.as_bytes(), Duration::from_secs(60)), Duration::ZERO);

        let token = fake_jwt(now - 10);
        assert_eq!(remaining_life(token.as_bytes(), Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_remaining_life_extreme_expiry() {
        let buffer = Duration::from_secs(60);
        assert_eq!(remaining_life(fake_jwt(i64::MIN).as_bytes(), buffer), Duration::ZERO);
        assert_eq!(remaining_life(fake_jwt(i64::MIN + 1).as_bytes(), buffer), Duration::ZERO);
        assert!(remaining_life(fake_jwt(i64::MAX).as_bytes(), buffer) > Duration::from_secs(1 << 60));
        assert_eq!(remaining_life(fake_jwt(i64::MIN).as_bytes(), Duration::MAX), Duration::ZERO);
    }

    #[test]
    fn test_expiry_ignores_signature() {
        // Tokens from the issuer are signed with keys this process never sees.
        let token = fake_jwt(1_900_000_000).replace(".sig", ".bm90LWEtc2ln");
        assert_eq!(expiry(token.as_bytes()), Some(1_900_000_000));
        assert_eq!(expiry(format!("{}\n", token).as_bytes()), Some(1_900_000_000));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("https://console-api.enforce.dev"), "console-api.enforce.dev");
        assert_eq!(sanitize("http://localhost:8080/"), "localhost-8080");
        assert_eq!(sanitize("https://example.com/api/v1"), "example.com-api-v1");
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::with_root(dir.path());
        let token = fake_jwt(Utc::now().timestamp() + 3600);

        store.save(token.as_bytes(), TokenKind::Access, AUDIENCE).await.unwrap();
        assert_eq!(store.load(TokenKind::Access, AUDIENCE).await.unwrap(), token.as_bytes());
        assert!(store.load(TokenKind::Refresh, AUDIENCE).await.is_err());

        let path = store.path(TokenKind::Access, AUDIENCE);
        assert!(path.ends_with("console-api.example.com/oidc-token"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn test_file_store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::with_root(dir.path());

        store.save(b"first", TokenKind::Refresh, AUDIENCE).await.unwrap();
        store.save(b"second", TokenKind::Refresh, AUDIENCE).await.unwrap();
        assert_eq!(store.load(TokenKind::Refresh, AUDIENCE).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_file_store_remaining_life() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::with_root(dir.path());

        assert_eq!(
            store.remaining_life(TokenKind::Access, AUDIENCE, Duration::from_secs(60)).await,
            Duration::ZERO
        );

        let token = fake_jwt(Utc::now().timestamp() + 600);
        store.save(token.as_bytes(), TokenKind::Access, AUDIENCE).await.unwrap();
        assert!(
            store.remaining_life(TokenKind::Access, AUDIENCE, Duration::from_secs(60)).await
                > Duration::from_secs(500)
        );
    }

    #[tokio::test]
    async fn test_memory_store_keys_by_kind_and_audience() {
        let store = MemoryTokenStore::new();
        store.insert(TokenKind::Access, AUDIENCE, "access");
        store.save(b"refresh", TokenKind::Refresh, AUDIENCE).await.unwrap();

        assert_eq!(store.load(TokenKind::Access, AUDIENCE).await.unwrap(), b"access");
        assert_eq!(store.load(TokenKind::Refresh, AUDIENCE).await.unwrap(), b"refresh");
        assert!(store.load(TokenKind::Access, "https://other.example.com").await.is_err());
    }
}
