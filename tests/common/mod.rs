//! Shared fixtures for the integration tests: a fake SSO gateway served by
//! wiremock plus client constructors pointed at it.

#![allow(dead_code)]

use campus_watch::auth::{SsoClient, SsoEndpoints};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LOGIN_PATH: &str = "/authserver/login";
pub const CAPTCHA_PATH: &str = "/authserver/checkNeedCaptcha.htl";
pub const FINGERPRINT_PATH: &str = "/authserver/bfp/info";

/// Challenge page: carries the hidden handshake fields and the marker text
/// the verify step looks for.
pub const LOGIN_PAGE: &str = r#"<html>
<head><title>统一身份认证</title></head>
<body>
  <form id="pwdFromId" method="post">
    <input type="hidden" id="execution" name="execution" value="e1s1-fixture"/>
    <input type="hidden" id="pwdEncryptSalt" value="ABCDEFGHJKMNPQRS"/>
  </form>
</body>
</html>"#;

/// Same page with the salt field removed
pub const LOGIN_PAGE_NO_SALT: &str = r#"<html>
<head><title>统一身份认证</title></head>
<body>
  <form id="pwdFromId" method="post">
    <input type="hidden" id="execution" name="execution" value="e1s1-fixture"/>
  </form>
</body>
</html>"#;

/// What the gateway serves once the session is accepted
pub const PORTAL_PAGE: &str = "<html><body>Personal Portal</body></html>";

pub fn endpoints(base: &str) -> SsoEndpoints {
    SsoEndpoints {
        login_url: format!("{base}{LOGIN_PATH}"),
        captcha_check_url: format!("{base}{CAPTCHA_PATH}"),
        fingerprint_url: format!("{base}{FINGERPRINT_PATH}?bfp=fixture"),
    }
}

pub fn client(server: &MockServer) -> SsoClient {
    SsoClient::new("student", "hunter2", endpoints(&server.uri())).expect("client builds")
}

pub async fn mount_probe_endpoints(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(CAPTCHA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"isNeed":false}"#))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(FINGERPRINT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

/// Mount a gateway that accepts `expected_logins` full handshakes: each
/// login consumes one challenge page and one form submit, and every GET
/// after that sees the portal page. The submit count is an expectation
/// verified when the server drops.
pub async fn mount_successful_gateway(server: &MockServer, expected_logins: u64) {
    Mock::given(method("GET"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .up_to_n_times(expected_logins)
        .mount(server)
        .await;

    mount_probe_endpoints(server).await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PORTAL_PAGE))
        .expect(expected_logins)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(PORTAL_PAGE))
        .mount(server)
        .await;
}

/// Mount a gateway that keeps serving the challenge page no matter what is
/// submitted, i.e. wrong credentials or an unhandled captcha.
pub async fn mount_rejecting_gateway(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(server)
        .await;

    mount_probe_endpoints(server).await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(server)
        .await;
}

/// A history file path that is unique per test so parallel tests never
/// share state.
pub fn temp_history_path(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("campus-watch-{}-{}.json", std::process::id(), tag))
}
