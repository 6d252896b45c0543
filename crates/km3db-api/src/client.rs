// Database HTTP gateway
//
// Wraps `reqwest::Client` with base-URL joining, session-cookie
// attachment, and the degrade-to-default contract: HTTP-level failures
// are logged and surface as `Ok(None)`, never as a hard error. The
// session-resolution machinery lives in `session.rs` as further
// inherent methods on `DbClient`.

use std::borrow::Cow;

use reqwest::header::COOKIE;
use tokio::sync::Mutex;
use tracing::{debug, error};
use url::Url;

use crate::error::Error;
use crate::session::SessionConfig;
use crate::transport::TransportConfig;

/// Default production endpoint of the KM3NeT database web API.
pub const BASE_URL: &str = "https://km3netdbweb.in2p3.fr";

/// HTTP client for the database web API.
///
/// One instance owns one session: the cookie is resolved on first use
/// ([`session_cookie`](Self::session_cookie)) and reused for every
/// request for the lifetime of the client. There is no refresh on
/// expiry — an expired session shows up as a logged HTTP error and an
/// empty result.
pub struct DbClient {
    http: reqwest::Client,
    base_url: Url,
    session: SessionConfig,
    /// Resolved session cookie. Mutex-guarded compute-once: a resolved
    /// token is never replaced, a failed resolution stays unset and is
    /// retried on the next request.
    cookie: Mutex<Option<String>>,
}

impl DbClient {
    /// Client against the production database.
    pub fn new() -> Result<Self, Error> {
        let base_url = Url::parse(BASE_URL)?;
        Self::with_base_url(base_url, &TransportConfig::default(), SessionConfig::default())
    }

    /// Client against an arbitrary endpoint.
    pub fn with_base_url(
        base_url: Url,
        transport: &TransportConfig,
        session: SessionConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            session,
            cookie: Mutex::new(None),
        })
    }

    /// Client with a pre-resolved session cookie.
    ///
    /// No credential source will be consulted; every request carries the
    /// given cookie.
    pub fn with_session_cookie(base_url: Url, cookie: impl Into<String>) -> Result<Self, Error> {
        let http = TransportConfig::default().build_client()?;
        Ok(Self {
            http,
            base_url,
            session: SessionConfig::default(),
            cookie: Mutex::new(Some(cookie.into())),
        })
    }

    /// The underlying HTTP client (for the login and whitelist flows).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The database base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// The session cookie, resolved once per client.
    ///
    /// `Ok(None)` means no credential source produced a valid token (the
    /// failure is already logged); requests then go out unauthenticated
    /// and fail at the HTTP layer. A failed resolution is not cached —
    /// the next call walks the sources again. `Err` is reserved for the
    /// paths that must not be swallowed: a transport failure talking to
    /// the IP-echo service, prompt I/O, and the like.
    pub async fn session_cookie(&self) -> Result<Option<String>, Error> {
        let mut cookie = self.cookie.lock().await;
        if cookie.is_none() {
            *cookie = self.resolve_session_cookie().await?;
        }
        Ok(cookie.clone())
    }

    /// Fetch `path` (relative to the base URL) and return the body text.
    ///
    /// The path is percent-decoded before joining, so pre-encoded inputs
    /// round-trip. An HTTP-level failure is logged together with the
    /// target URL (an expired session is the usual cause) and comes back
    /// as `Ok(None)` — callers substitute their own default. A truncated
    /// transfer is not a failure: whatever arrived is returned.
    pub async fn get(&self, path: &str) -> Result<Option<String>, Error> {
        let path = urlencoding::decode(path).unwrap_or(Cow::Borrowed(path));
        let target_url = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path);
        let url = Url::parse(&target_url)?;

        let mut request = self.http.get(url);
        if let Some(cookie) = self.session_cookie().await? {
            request = request.header(COOKIE, format!("sid={cookie}"));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    "HTTP error, your session may be expired.\n\
                     Original HTTP error: {e}\n\
                     Target URL: {target_url}"
                );
                return Ok(None);
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!(
                "HTTP error, your session may be expired.\n\
                 Original HTTP error: {status}\n\
                 Target URL: {target_url}"
            );
            return Ok(None);
        }

        // Stream the body chunk-wise so a truncated transfer still
        // yields the bytes received so far.
        let mut response = response;
        let mut content = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => content.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(_) => {
                    error!("Incomplete data received from the DB.");
                    break;
                }
            }
        }

        debug!("got {} bytes of data", content.len());
        Ok(Some(String::from_utf8_lossy(&content).into_owned()))
    }
}
