#![allow(clippy::unwrap_used)]
// Integration tests for `DbClient` using wiremock.

use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use km3db_api::{CredentialSource, DbClient, Error, SessionConfig, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

const LOGIN_COOKIE: &str = "_kmcprod_134.158_testsession1";

fn login_config() -> SessionConfig {
    SessionConfig {
        sources: vec![CredentialSource::Login],
        username: Some("dbuser".into()),
        password: Some("dbpass".to_string().into()),
        prompt: false,
        ..SessionConfig::default()
    }
}

async fn client_with(server: &MockServer, session: SessionConfig) -> DbClient {
    let base_url = Url::parse(&server.uri()).unwrap();
    DbClient::with_base_url(base_url, &TransportConfig::default(), session).unwrap()
}

// ── Login tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_yields_session_cookie() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home.htm"))
        .and(query_param("usr", "dbuser"))
        .and(query_param("pwd", "dbpass"))
        .and(query_param("persist", "y"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!("sid={LOGIN_COOKIE}")))
        .mount(&server)
        .await;

    let client = client_with(&server, login_config()).await;
    let cookie = client.session_cookie().await.unwrap();

    assert_eq!(cookie.as_deref(), Some(LOGIN_COOKIE));
}

#[tokio::test]
async fn test_login_with_bad_credentials_yields_no_cookie() {
    let server = MockServer::start().await;

    // The login page answers 200 with an HTML error body; no token in it.
    Mock::given(method("GET"))
        .and(path("/home.htm"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html>Wrong username or password</html>"),
        )
        .mount(&server)
        .await;

    let client = client_with(&server, login_config()).await;
    let cookie = client.session_cookie().await.unwrap();

    assert_eq!(cookie, None);
}

#[tokio::test]
async fn test_login_token_failing_the_pattern_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string("sid=NOT-A-TOKEN"))
        .mount(&server)
        .await;

    let client = client_with(&server, login_config()).await;
    let cookie = client.session_cookie().await.unwrap();

    assert_eq!(cookie, None);
}

#[tokio::test]
async fn test_login_without_credentials_and_prompt_disabled() {
    let server = MockServer::start().await;

    let session = SessionConfig {
        sources: vec![CredentialSource::Login],
        prompt: false,
        ..SessionConfig::default()
    };

    let client = client_with(&server, session).await;
    let result = client.session_cookie().await;

    // No presets, no prompt: resolution must fail hard rather than hang
    // on a terminal read. (With ambient KM3NET_DB_* variables the login
    // hits the mock server, which has no /home.htm mounted.)
    assert!(
        matches!(result, Err(Error::Authentication { .. })) || matches!(result, Ok(None)),
        "expected a failed resolution, got: {result:?}"
    );
}

// ── Cookie-file tests ───────────────────────────────────────────────

#[tokio::test]
async fn test_cookie_file_provides_the_token_directly() {
    let server = MockServer::start().await;

    let dir = tempfile::tempdir().unwrap();
    let cookie_path = dir.path().join(".km3netdb_cookie");
    std::fs::write(&cookie_path, ".in2p3.fr\tTRUE\t/\t0\tsid\t_kmcprod_134.158_filetoken42\n")
        .unwrap();

    let session = SessionConfig {
        sources: vec![CredentialSource::CookieFile, CredentialSource::Login],
        cookie_file: Some(cookie_path),
        // Even with full login credentials at hand the file wins.
        username: Some("dbuser".into()),
        password: Some("dbpass".to_string().into()),
        prompt: false,
        ..SessionConfig::default()
    };

    let client = client_with(&server, session).await;
    let cookie = client.session_cookie().await.unwrap();

    assert_eq!(cookie.as_deref(), Some("_kmcprod_134.158_filetoken42"));
    // No login request was issued.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_cookie_file_falls_through_to_login() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!("sid={LOGIN_COOKIE}")))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let session = SessionConfig {
        cookie_file: Some(dir.path().join(".km3netdb_cookie")),
        sources: vec![CredentialSource::CookieFile, CredentialSource::Login],
        ..login_config()
    };

    let client = client_with(&server, session).await;
    let cookie = client.session_cookie().await.unwrap();

    assert_eq!(cookie.as_deref(), Some(LOGIN_COOKIE));
}

// ── Trusted-network tests ───────────────────────────────────────────

#[tokio::test]
async fn test_external_ip_match_grants_the_fixed_cookie() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(ResponseTemplate::new(200).set_body_string("131.188.161.155"))
        .mount(&server)
        .await;

    let session = SessionConfig {
        sources: vec![CredentialSource::TrustedNetwork],
        ip_echo_url: format!("{}/ip", server.uri()),
        prompt: false,
        ..SessionConfig::default()
    };

    let client = client_with(&server, session).await;
    let cookie = client.session_cookie().await.unwrap();

    assert_eq!(
        cookie.as_deref(),
        Some("_gitlab-km3net_131.188.161.155_f835d56ca6d946efb38324d59e040761")
    );
}

#[tokio::test]
async fn test_trusted_network_wins_over_file_and_login() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(ResponseTemplate::new(200).set_body_string("131.188.161.155"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cookie_path = dir.path().join(".km3netdb_cookie");
    std::fs::write(&cookie_path, "sid\t_kmcprod_134.158_filetoken42\n").unwrap();

    let session = SessionConfig {
        cookie_file: Some(cookie_path),
        ip_echo_url: format!("{}/ip", server.uri()),
        ..login_config()
    };
    let session = SessionConfig {
        sources: vec![
            CredentialSource::TrustedNetwork,
            CredentialSource::CookieFile,
            CredentialSource::Login,
        ],
        ..session
    };

    let client = client_with(&server, session).await;
    let cookie = client.session_cookie().await.unwrap();

    // The fixed network token wins; neither the file token nor a login
    // request is consulted.
    assert_eq!(
        cookie.as_deref(),
        Some("_gitlab-km3net_131.188.161.155_f835d56ca6d946efb38324d59e040761")
    );
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() == "/ip"));
}

#[tokio::test]
async fn test_external_ip_mismatch_exhausts_resolution() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.7"))
        .mount(&server)
        .await;

    let session = SessionConfig {
        sources: vec![CredentialSource::TrustedNetwork],
        ip_echo_url: format!("{}/ip", server.uri()),
        prompt: false,
        ..SessionConfig::default()
    };

    let client = client_with(&server, session).await;
    let cookie = client.session_cookie().await.unwrap();

    assert_eq!(cookie, None);
}

#[tokio::test]
async fn test_ip_echo_transport_failure_propagates() {
    let server = MockServer::start().await;

    let session = SessionConfig {
        sources: vec![CredentialSource::TrustedNetwork],
        // Nothing listens on port 9: the check must not be swallowed.
        ip_echo_url: "http://127.0.0.1:9".into(),
        prompt: false,
        ..SessionConfig::default()
    };

    let client = client_with(&server, session).await;
    let result = client.session_cookie().await;

    assert!(
        matches!(result, Err(Error::Transport(_))),
        "expected Transport error, got: {result:?}"
    );
}

// ── Gateway tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_get_attaches_the_session_cookie() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/streamds"))
        .and(header("cookie", "sid=_kmcprod_134.158_gatewaytoken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("STREAM\tDESCRIPTION\n"))
        .mount(&server)
        .await;

    let base_url = Url::parse(&server.uri()).unwrap();
    let client = DbClient::with_session_cookie(base_url, "_kmcprod_134.158_gatewaytoken").unwrap();

    let body = client.get("streamds").await.unwrap();
    assert_eq!(body.as_deref(), Some("STREAM\tDESCRIPTION\n"));
}

#[tokio::test]
async fn test_get_resolves_the_cookie_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!("sid={LOGIN_COOKIE}")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/streamds"))
        .and(header("cookie", format!("sid={LOGIN_COOKIE}")))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_with(&server, login_config()).await;
    assert_eq!(client.get("streamds").await.unwrap().as_deref(), Some("ok"));
    assert_eq!(client.get("streamds").await.unwrap().as_deref(), Some("ok"));
}

#[tokio::test]
async fn test_get_returns_none_on_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/streamds/runs.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let base_url = Url::parse(&server.uri()).unwrap();
    let client = DbClient::with_session_cookie(base_url, "_kmcprod_134.158_gatewaytoken").unwrap();

    let body = client.get("streamds/runs.txt?detid=49").await.unwrap();
    assert_eq!(body, None);
}

#[tokio::test]
async fn test_get_decodes_a_percent_encoded_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/streamds/detectors.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OID\nD1\n"))
        .mount(&server)
        .await;

    let base_url = Url::parse(&server.uri()).unwrap();
    let client = DbClient::with_session_cookie(base_url, "_kmcprod_134.158_gatewaytoken").unwrap();

    let body = client.get("streamds%2Fdetectors.txt").await.unwrap();
    assert_eq!(body.as_deref(), Some("OID\nD1\n"));
}
