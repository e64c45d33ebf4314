//! Session supervisor tests: the retry budget is exactly one re-login and
//! one re-run, and only explicit auth failures spend it.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use campus_watch::auth::{with_retry_on_auth_failure, TaskError};
use common::*;
use wiremock::MockServer;

#[tokio::test]
async fn recovers_from_a_single_auth_failure() {
    let server = MockServer::start().await;
    // The expectation of exactly one submit is the login budget check
    mount_successful_gateway(&server, 1).await;
    let client = client(&server);

    let calls = AtomicUsize::new(0);
    let result = with_retry_on_auth_failure(&client, || async {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(TaskError::AuthExpired)
        } else {
            Ok(42)
        }
    })
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn persistent_auth_failure_surfaces_after_one_relogin() {
    let server = MockServer::start().await;
    mount_successful_gateway(&server, 1).await;
    let client = client(&server);

    let calls = AtomicUsize::new(0);
    let result: Result<i32, TaskError> = with_retry_on_auth_failure(&client, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(TaskError::AuthExpired)
    })
    .await;

    assert!(matches!(result, Err(TaskError::AuthExpired)));
    // One original run plus exactly one retry; the submit expectation on
    // the mock gateway caps logins at one
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_relogin_surfaces_without_rerunning_work() {
    let server = MockServer::start().await;
    mount_rejecting_gateway(&server).await;
    let client = client(&server);

    let calls = AtomicUsize::new(0);
    let result: Result<i32, TaskError> = with_retry_on_auth_failure(&client, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(TaskError::AuthExpired)
    })
    .await;

    assert!(matches!(result, Err(TaskError::AuthExpired)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn non_auth_failures_do_not_trigger_a_relogin() {
    let server = MockServer::start().await;
    // A login attempt would have to submit the form; expect zero submits
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path(LOGIN_PATH))
        .respond_with(wiremock::ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let client = client(&server);

    let calls = AtomicUsize::new(0);
    let result: Result<i32, TaskError> = with_retry_on_auth_failure(&client, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(TaskError::Failed(anyhow!("downstream payload was garbage")))
    })
    .await;

    assert!(matches!(result, Err(TaskError::Failed(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn successful_work_passes_straight_through() {
    let server = MockServer::start().await;
    let client = client(&server);

    let result = with_retry_on_auth_failure(&client, || async { Ok("fine") }).await;
    assert_eq!(result.unwrap(), "fine");
}
