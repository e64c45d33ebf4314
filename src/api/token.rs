//! Bearer-token derivation over a service's CAS redirect bridge.
//!
//! Downstream API families do not accept the SSO cookies directly. Each
//! exposes a CAS bridge URL that, given an authenticated session, redirects
//! back into the service with a session identifier embedded in the final
//! URL. Fetching that URL with redirects followed and scraping the
//! identifier out of where we land yields a bearer-style credential for
//! that service.

use reqwest::Url;
use tracing::{debug, warn};

use crate::api::error::EngineError;
use crate::auth::SsoClient;

/// Scheme prefix the downstream APIs expect in their auth header
const TOKEN_SCHEME: &str = "bearer";

/// Query parameter / path marker carrying the session identifier
const SESSION_ID_MARKER: &str = "jsessionid";

/// Derive a bearer token for the service behind `service_login_url`.
///
/// The token is only as durable as the session cookies backing it; callers
/// must be prepared to re-derive when the downstream API answers with a 401
/// or bounces them back to the login page. Both "no identifier in the final
/// URL" and transport failures are recoverable conditions reported as
/// `None`, with the distinction preserved in the logs.
pub async fn derive_token(client: &SsoClient, service_login_url: &str) -> Option<String> {
    match try_derive(client, service_login_url).await {
        Ok(token) => Some(token),
        Err(err) => {
            warn!(url = %service_login_url, error = %err, "token derivation failed");
            None
        }
    }
}

async fn try_derive(client: &SsoClient, service_login_url: &str) -> Result<String, EngineError> {
    // Redirects are followed to completion; only the final URL matters
    let response = client.http().get(service_login_url).send().await?;
    let final_url = response.url().clone();
    debug!(final_url = %final_url, "redirect chain settled");

    match extract_session_id(&final_url) {
        Some(id) => Ok(format!("{TOKEN_SCHEME} {id}")),
        None => {
            warn!(final_url = %final_url, "no session identifier in final redirect URL");
            Err(EngineError::TokenNotFound)
        }
    }
}

/// Pull the session identifier out of a settled redirect URL.
/// A `jsessionid` query parameter wins over a path-embedded marker.
pub(crate) fn extract_session_id(url: &Url) -> Option<String> {
    if let Some((_, value)) = url.query_pairs().find(|(key, _)| key == SESSION_ID_MARKER) {
        if !value.is_empty() {
            return Some(value.into_owned());
        }
    }

    // CAS-style path embedding: /app;jsessionid=ABC123 or /app/jsessionid=ABC123
    let (_, rest) = url.path().split_once("jsessionid=")?;
    let id = rest.split([';', '&', '/']).next().unwrap_or(rest);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}
