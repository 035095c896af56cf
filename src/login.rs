//! Interactive browser login.
//!
//! The browser flow sends the user to the issuer's `/oauth` page with a
//! redirect back to a short-lived HTTP server on localhost. The issuer appends
//! the minted tokens to the redirect as `token` and `refresh_token` query
//! parameters.

use std::fmt;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::TokenError;
use crate::types::TokenPair;

/// Parameters of one browser login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginOptions {
    /// OIDC issuer URL.
    pub issuer: String,
    /// Audiences the minted token is scoped to.
    pub audience: Vec<String>,
    /// OAuth client ID.
    pub client_id: String,
    /// Identity to assume, or empty.
    pub identity: String,
    /// Identity provider override, or empty.
    pub identity_provider: String,
    /// Social connection, or empty.
    pub social_connection: String,
    /// Verified organization name, or empty.
    pub org_name: String,
    /// Ask the issuer to mint a refresh token too.
    pub create_refresh_token: bool,
}

impl LoginOptions {
    /// Build the issuer URL the browser is sent to.
    pub fn login_url(&self, redirect: &str) -> Result<Url, TokenError> {
        let mut url = Url::parse(&self.issuer)
            .and_then(|issuer| issuer.join("/oauth"))
            .map_err(|e| TokenError::Configuration(format!("invalid issuer {}: {}", self.issuer, e)))?;

        {
            let mut query = url.query_pairs_mut();
            for aud in &self.audience {
                query.append_pair("audience", aud);
            }
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("exit", "redirect")
                .append_pair("redirect", redirect)
                .append_pair("skip_registration", "true");
            if !self.identity.is_empty() {
                query.append_pair("identity", &self.identity);
            }
            if !self.identity_provider.is_empty() {
                query.append_pair("idp_id", &self.identity_provider);
            }
            if !self.social_connection.is_empty() {
                query.append_pair("connection", &self.social_connection);
            }
            if !self.org_name.is_empty() {
                query.append_pair("org_name", &self.org_name);
            }
            if self.create_refresh_token {
                query.append_pair("create_refresh_token", "true");
            }
        }

        Ok(url)
    }
}

/// An interactive login flow returning a token pair.
#[async_trait::async_trait]
pub trait BrowserLogin: Send + Sync {
    /// Run the flow to completion.
    async fn login(&self, options: LoginOptions) -> Result<TokenPair, TokenError>;
}

type UrlHandler = Arc<dyn Fn(&Url) + Send + Sync>;

/// [`BrowserLogin`] that opens the system browser and waits for the redirect
/// on a localhost listener.
///
/// The caller bounds the wait; the token manager allows two minutes.
#[derive(Clone)]
pub struct LocalBrowserLogin {
    open_url: UrlHandler,
}

impl Default for LocalBrowserLogin {
    fn default() -> Self {
        Self {
            open_url: Arc::new(open_in_browser),
        }
    }
}

impl fmt::Debug for LocalBrowserLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBrowserLogin").finish_non_exhaustive()
    }
}

fn open_in_browser(url: &Url) {
    if open::that(url.as_str()).is_err() {
        // stdout carries the plugin handshake.
        eprintln!("Could not open browser. Please visit:\n{}", url);
    }
}

impl LocalBrowserLogin {
    /// Create a login flow that opens the system browser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace how the login URL is presented to the user.
    pub fn with_url_handler(mut self, handler: impl Fn(&Url) + Send + Sync + 'static) -> Self {
        self.open_url = Arc::new(handler);
        self
    }
}

#[async_trait::async_trait]
impl BrowserLogin for LocalBrowserLogin {
    async fn login(&self, options: LoginOptions) -> Result<TokenPair, TokenError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let redirect = format!("http://localhost:{}/callback", port);
        let url = options.login_url(&redirect)?;

        let (result_tx, result_rx) = oneshot::channel();
        let app = Router::new()
            .route("/callback", get(handle_callback))
            .with_state(CallbackState::new(result_tx));

        // Dropping the sender (on return or cancellation) stops the server.
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
                warn!(error = %e, "Login callback server failed");
            }
        });

        info!(issuer = %options.issuer, port = port, "Waiting for browser login");
        (self.open_url)(&url);

        let result = result_rx
            .await
            .map_err(|_| TokenError::Login("login callback server stopped".to_string()))?;
        let _ = shutdown_tx.send(());
        result
    }
}

const SUCCESS_PAGE: &str =
    "<html><body><h1>Login successful</h1><p>You may close this window.</p></body></html>";
const FAILURE_PAGE: &str =
    "<html><body><h1>Login failed</h1><p>Check the terminal for details.</p></body></html>";

type CallbackResult = Result<TokenPair, TokenError>;

/// Hands the first callback's outcome to the waiting login.
#[derive(Clone)]
struct CallbackState {
    sender: Arc<Mutex<Option<oneshot::Sender<CallbackResult>>>>,
}

impl CallbackState {
    fn new(sender: oneshot::Sender<CallbackResult>) -> Self {
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
        }
    }

    fn complete(&self, result: CallbackResult) {
        let sender = self.sender.lock().ok().and_then(|mut sender| sender.take());
        match sender {
            Some(sender) => {
                let _ = sender.send(result);
            },
            None => debug!("Ignoring repeated login callback"),
        }
    }
}

/// Query parameters the issuer appends to the redirect.
#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    token: Option<String>,
    refresh_token: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    fn into_pair(self) -> CallbackResult {
        if let Some(error) = self.error {
            return Err(TokenError::Login(format!("issuer returned error: {}", error)));
        }
        let access_token = self.token.unwrap_or_default();
        if access_token.is_empty() {
            return Err(TokenError::Login("callback did not include a token".to_string()));
        }
        Ok(TokenPair::new(access_token, self.refresh_token.unwrap_or_default()))
    }
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<&'static str>) {
    let result = params.into_pair();
    let response = match &result {
        Ok(_) => (StatusCode::OK, Html(SUCCESS_PAGE)),
        Err(e) => {
            warn!(error = %e, "Login callback rejected");
            (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE))
        },
    };
    state.complete(result);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn options() -> LoginOptions {
        LoginOptions {
            issuer: "https://issuer.example.com".to_string(),
            audience: vec!["https://console-api.example.com".to_string()],
            client_id: "test-client".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_login_url_minimal() {
        let url = options().login_url("http://localhost:1234/callback").unwrap();
        assert_eq!(url.path(), "/oauth");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("audience".into(), "https://console-api.example.com".into())));
        assert!(pairs.contains(&("client_id".into(), "test-client".into())));
        assert!(pairs.contains(&("redirect".into(), "http://localhost:1234/callback".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "identity" || k == "create_refresh_token"));
    }

    #[test]
    fn test_login_url_full() {
        let opts = LoginOptions {
            identity: "abc/def".to_string(),
            identity_provider: "abc/idp".to_string(),
            social_connection: "github".to_string(),
            org_name: "example.com".to_string(),
            create_refresh_token: true,
            ..options()
        };
        let url = opts.login_url("http://localhost:1/callback").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("identity".into(), "abc/def".into())));
        assert!(pairs.contains(&("idp_id".into(), "abc/idp".into())));
        assert!(pairs.contains(&("connection".into(), "github".into())));
        assert!(pairs.contains(&("org_name".into(), "example.com".into())));
        assert!(pairs.contains(&("create_refresh_token".into(), "true".into())));
    }

    #[test]
    fn test_login_url_invalid_issuer() {
        let opts = LoginOptions {
            issuer: "::".to_string(),
            ..options()
        };
        assert!(matches!(
            opts.login_url("http://localhost:1/callback"),
            Err(TokenError::Configuration(_))
        ));
    }

    fn params(target: &str) -> CallbackParams {
        let uri: axum::http::Uri = format!("http://localhost{}", target).parse().unwrap();
        Query::<CallbackParams>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_callback_params() {
        let pair = params("/callback?token=abc&refresh_token=def").into_pair().unwrap();
        assert_eq!(pair, TokenPair::new("abc", "def"));

        let pair = params("/callback?token=abc").into_pair().unwrap();
        assert!(!pair.has_refresh_token());

        assert!(matches!(params("/callback").into_pair(), Err(TokenError::Login(_))));
        assert!(matches!(params("/callback?token=").into_pair(), Err(TokenError::Login(_))));

        let err = params("/callback?token=abc&error=access_denied").into_pair().unwrap_err();
        assert!(err.message().contains("access_denied"));
    }

    async fn send_get(redirect: Url, path_and_query: String) {
        let addr = format!("127.0.0.1:{}", redirect.port().unwrap());
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path_and_query
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        let _ = stream.read_to_end(&mut response).await;
    }

    fn redirect_of(url: &Url) -> Url {
        let redirect = url
            .query_pairs()
            .find(|(k, _)| k == "redirect")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        Url::parse(&redirect).unwrap()
    }

    #[tokio::test]
    async fn test_local_login_receives_tokens() {
        let login = LocalBrowserLogin::new().with_url_handler(|url| {
            let redirect = redirect_of(url);
            tokio::spawn(async move {
                send_get(redirect.clone(), "/favicon.ico".to_string()).await;
                send_get(redirect, "/callback?token=access&refresh_token=refresh".to_string())
                    .await;
            });
        });

        let pair = login.login(options()).await.unwrap();
        assert_eq!(pair, TokenPair::new("access", "refresh"));
    }

    #[tokio::test]
    async fn test_local_login_reports_issuer_error() {
        let login = LocalBrowserLogin::new().with_url_handler(|url| {
            let redirect = redirect_of(url);
            tokio::spawn(send_get(redirect, "/callback?error=denied".to_string()));
        });

        let err = login.login(options()).await.unwrap_err();
        assert!(err.message().contains("denied"));
    }

    #[tokio::test]
    async fn test_local_login_not_blocked_by_idle_connection() {
        // Browsers open speculative connections that never send a request.
        let login = LocalBrowserLogin::new().with_url_handler(|url| {
            let redirect = redirect_of(url);
            tokio::spawn(async move {
                let addr = format!("127.0.0.1:{}", redirect.port().unwrap());
                let idle = TcpStream::connect(addr).await.unwrap();
                send_get(redirect, "/callback?token=access".to_string()).await;
                tokio::time::sleep(Duration::from_secs(10)).await;
                drop(idle);
            });
        });

        let pair = tokio::time::timeout(Duration::from_secs(5), login.login(options()))
            .await
            .expect("callback was not served while an idle connection was open")
            .unwrap();
        assert_eq!(pair, TokenPair::access_only("access"));
    }

    #[tokio::test]
    async fn test_local_login_cancellation_releases_port() {
        let port = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&port);
        let login = LocalBrowserLogin::new().with_url_handler(move |url| {
            *seen.lock().unwrap() = redirect_of(url).port();
        });

        let result = tokio::time::timeout(Duration::from_millis(100), login.login(options())).await;
        assert!(result.is_err());

        let port = port.lock().unwrap().unwrap();
        let mut rebound = None;
        for _ in 0..50 {
            if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)).await {
                rebound = Some(listener);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(rebound.is_some());
    }
}
