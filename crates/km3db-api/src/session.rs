// Session authentication
//
// Credential resolution for the database web API. Three kinds of source,
// tried in configurable order: trusted networks (fixed tokens, no
// login), the persisted per-user cookie file, and a username/password
// login. Login-issued tokens are pattern-checked; wrong credentials
// degrade to "no session" rather than an error.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, warn};

use crate::client::DbClient;
use crate::error::Error;

/// Per-user file holding a previously issued session token. The token is
/// the last tab-separated field of the file.
pub const COOKIE_FILENAME: &str = ".km3netdb_cookie";

/// Environment variables carrying login credentials.
pub const USERNAME_VAR: &str = "KM3NET_DB_USERNAME";
pub const PASSWORD_VAR: &str = "KM3NET_DB_PASSWORD";

/// IP-echo service consulted for the external-IP network check.
const IP_ECHO_URL: &str = "https://ident.me";

/// Anchored shape of a server-issued session token: an `_`-wrapped
/// lowercase segment, one to three dotted numeric groups, and a final
/// alphanumeric segment.
fn session_cookie_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^_[a-z0-9-]+_(\d{1,3}\.){1,3}\d{1,3}_[a-z0-9]+").expect("hard-coded regex")
    })
}

/// Whether `cookie` has the lexical shape of a server-issued session
/// token. Tokens failing this are treated as a failed login and never
/// cached.
pub fn is_valid_session_cookie(cookie: &str) -> bool {
    session_cookie_pattern().is_match(cookie)
}

/// Networks pre-trusted by the database service. Hosts on these networks
/// get a fixed session token without logging in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustedNetwork {
    /// The Lyon computing centre (local address in `134.158.0.0/16`).
    Lyon,
    /// The collaboration Jupyter hub (local address matches
    /// `jupyter.km3net.de`).
    Jupyter,
    /// The GitLab CI runners (public address checked via IP echo).
    Gitlab,
}

impl TrustedNetwork {
    pub const ALL: [Self; 3] = [Self::Lyon, Self::Jupyter, Self::Gitlab];

    /// The fixed session token granted to hosts on this network.
    pub fn session_cookie(self) -> &'static str {
        match self {
            Self::Lyon => "_kmcprod_134.158_lyo7783844001343100343mcprod1223user",
            Self::Jupyter => "_jupyter-km3net_131.188.161.143_d9fe89a1568a49a5ac03bdf15d93d799",
            Self::Gitlab => "_gitlab-km3net_131.188.161.155_f835d56ca6d946efb38324d59e040761",
        }
    }
}

/// A credential source, tried in the order listed in
/// [`SessionConfig::sources`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Fixed token for hosts on a trusted network.
    TrustedNetwork,
    /// Token from the persisted per-user cookie file.
    CookieFile,
    /// Username/password login (preset, environment, or interactive).
    Login,
}

/// Session-resolution configuration.
///
/// The default source order matches the scripting-access conventions of
/// the database: trusted networks first, then the cookie file (which
/// wins over environment credentials — the file carries a token
/// directly, the environment only feeds a login), then the login
/// request itself.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Source order; the first source yielding a token wins.
    pub sources: Vec<CredentialSource>,
    /// Cookie file location; defaults to `~/.km3netdb_cookie`.
    pub cookie_file: Option<PathBuf>,
    /// Preset username; consulted before `KM3NET_DB_USERNAME`.
    pub username: Option<String>,
    /// Preset password; consulted before `KM3NET_DB_PASSWORD`.
    pub password: Option<SecretString>,
    /// Whether missing credentials may be asked for on the terminal.
    pub prompt: bool,
    /// IP-echo endpoint for the external-IP network check.
    pub ip_echo_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                CredentialSource::TrustedNetwork,
                CredentialSource::CookieFile,
                CredentialSource::Login,
            ],
            cookie_file: None,
            username: None,
            password: None,
            prompt: true,
            ip_echo_url: IP_ECHO_URL.into(),
        }
    }
}

impl SessionConfig {
    /// The effective cookie-file path.
    pub fn cookie_file_path(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.cookie_file {
            return Some(path.clone());
        }
        directories::UserDirs::new().map(|dirs| dirs.home_dir().join(COOKIE_FILENAME))
    }
}

impl DbClient {
    /// Walk the configured credential sources and return the first
    /// token.
    ///
    /// `Ok(None)` means resolution was exhausted without a valid token
    /// (already logged). DNS failures in the local-address checks mean
    /// "not on that network" and fall through; a transport failure
    /// talking to the IP-echo service propagates.
    pub(crate) async fn resolve_session_cookie(&self) -> Result<Option<String>, Error> {
        for source in self.session().sources.clone() {
            match source {
                CredentialSource::TrustedNetwork => {
                    for network in TrustedNetwork::ALL {
                        if self.on_trusted_network(network).await? {
                            debug!("on trusted network {network:?}, using its session cookie");
                            return Ok(Some(network.session_cookie().to_owned()));
                        }
                    }
                }
                CredentialSource::CookieFile => {
                    if let Some(cookie) = self.cookie_from_file()? {
                        return Ok(Some(cookie));
                    }
                }
                CredentialSource::Login => return self.request_session_cookie().await,
            }
        }
        Ok(None)
    }

    /// Check whether this host belongs to `network`.
    pub(crate) async fn on_trusted_network(&self, network: TrustedNetwork) -> Result<bool, Error> {
        match network {
            TrustedNetwork::Lyon => {
                let Some(ip) = local_ip().await else {
                    return Ok(false);
                };
                Ok(ip.to_string().starts_with("134.158."))
            }
            TrustedNetwork::Jupyter => {
                let Some(ip) = local_ip().await else {
                    return Ok(false);
                };
                let Some(jupyter_ip) = resolve_host("jupyter.km3net.de").await else {
                    return Ok(false);
                };
                Ok(ip == jupyter_ip)
            }
            TrustedNetwork::Gitlab => {
                let external_ip = self
                    .http()
                    .get(&self.session().ip_echo_url)
                    .send()
                    .await?
                    .text()
                    .await?;
                Ok(external_ip.trim() == "131.188.161.155")
            }
        }
    }

    /// Token from the persisted cookie file, if the file exists.
    fn cookie_from_file(&self) -> Result<Option<String>, Error> {
        let Some(path) = self.session().cookie_file_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let cookie = content.rsplit('\t').next().unwrap_or_default().trim();
        if cookie.is_empty() {
            warn!("cookie file {} is empty", path.display());
            return Ok(None);
        }
        debug!("using session cookie from {}", path.display());
        Ok(Some(cookie.to_owned()))
    }

    /// Ask the login endpoint for a fresh session token.
    ///
    /// The response body carries the token after a `sid=` marker. A body
    /// that does not yield a well-formed token means wrong credentials:
    /// logged, not cached, no token.
    async fn request_session_cookie(&self) -> Result<Option<String>, Error> {
        let (username, password) = self.credentials().await?;

        let login_url = format!(
            "{}/home.htm?usr={}&pwd={}&persist=y",
            self.base_url().as_str().trim_end_matches('/'),
            username,
            password.expose_secret(),
        );
        debug!("requesting a session cookie for user {username}");

        let body = self.http().get(&login_url).send().await?.text().await?;
        let cookie = body.rsplit("sid=").next().unwrap_or_default().trim_end();

        if !is_valid_session_cookie(cookie) {
            error!("wrong username or password");
            return Ok(None);
        }

        Ok(Some(cookie.to_owned()))
    }

    /// Username/password from presets, the environment, or the prompt.
    async fn credentials(&self) -> Result<(String, SecretString), Error> {
        let config = self.session();
        let username = config
            .username
            .clone()
            .or_else(|| std::env::var(USERNAME_VAR).ok());
        let password = config
            .password
            .clone()
            .or_else(|| std::env::var(PASSWORD_VAR).ok().map(SecretString::from));

        match (username, password) {
            (Some(username), Some(password)) => Ok((username, password)),
            (username, password) if config.prompt => prompt_credentials(username, password).await,
            _ => Err(Error::Authentication {
                message: "no username/password available and prompting is disabled".into(),
            }),
        }
    }
}

/// Ask for the missing credential parts on the terminal. The username is
/// echoed, the password is not.
async fn prompt_credentials(
    username: Option<String>,
    password: Option<SecretString>,
) -> Result<(String, SecretString), Error> {
    tokio::task::spawn_blocking(move || {
        let username = match username {
            Some(username) => username,
            None => dialoguer::Input::<String>::new()
                .with_prompt("Please enter your KM3NeT DB username")
                .interact_text()
                .map_err(|e| Error::Prompt(e.to_string()))?,
        };
        let password = match password {
            Some(password) => password,
            None => dialoguer::Password::new()
                .with_prompt("Password")
                .interact()
                .map(SecretString::from)
                .map_err(|e| Error::Prompt(e.to_string()))?,
        };
        Ok((username, password))
    })
    .await
    .map_err(|e| Error::Prompt(format!("prompt task failed: {e}")))?
}

/// Forward-resolve this machine's hostname to its primary address.
async fn local_ip() -> Option<IpAddr> {
    let name = hostname::get().ok()?.into_string().ok()?;
    resolve_host(&name).await
}

async fn resolve_host(host: &str) -> Option<IpAddr> {
    let mut addrs = tokio::net::lookup_host((host, 0u16)).await.ok()?;
    Some(addrs.next()?.ip())
}
