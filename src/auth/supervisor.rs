//! Session supervisor: one-shot re-login-on-failure policy.
//!
//! Callers run a unit of work against the shared session through
//! [`with_retry_on_auth_failure`]. If the work explicitly signals that the
//! session is no longer accepted, the supervisor logs in once more and
//! re-runs the work once. The retry budget is strictly one extra attempt,
//! so a gateway outage can never turn into a login loop.

use std::future::Future;

use thiserror::Error;
use tracing::warn;

use crate::api::error::EngineError;
use crate::auth::sso::SsoClient;

/// Failure signal for supervised work units.
///
/// Only `AuthExpired` triggers the supervisor's re-login; everything else
/// surfaces to the caller untouched.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("session no longer accepted by the gateway")]
    AuthExpired,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl From<reqwest::Error> for TaskError {
    fn from(err: reqwest::Error) -> Self {
        TaskError::Failed(EngineError::Transport(err).into())
    }
}

/// Run `work`, recovering from exactly one authentication failure.
///
/// On [`TaskError::AuthExpired`] the supervisor calls
/// [`SsoClient::login`] once; if that succeeds, `work` is re-run once and
/// its result returned as-is. A failed re-login, or a second failure of
/// any kind, surfaces without further recursion.
pub async fn with_retry_on_auth_failure<T, F, Fut>(
    client: &SsoClient,
    work: F,
) -> Result<T, TaskError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, TaskError>>,
{
    match work().await {
        Ok(value) => Ok(value),
        Err(TaskError::AuthExpired) => {
            warn!("work unit reported an expired session, attempting one re-login");
            if !client.login().await {
                warn!("re-login failed, surfacing the authentication failure");
                return Err(TaskError::AuthExpired);
            }
            work().await
        }
        Err(other) => Err(other),
    }
}
