//! Power watcher: emails when the dorm's electricity balance runs low.
//!
//! The balance endpoint trusts a service-side session rather than a bearer
//! token, so each check first touches the service's CAS bridge URL to
//! refresh that session off the shared SSO cookies. A refresh that comes
//! back non-200 is the auth-failure signal for the supervisor.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{info, warn};

use crate::api::EngineError;
use crate::auth::{with_retry_on_auth_failure, SsoClient, TaskError};
use crate::notify::Notifier;
use crate::watchers::Watcher;

const POWER_ALERT_SUBJECT: &str = "[Power alert] electricity balance running low";

#[derive(Debug, Deserialize)]
struct PowerResponse {
    /// Outer envelope status; 0 is success
    e: Option<i64>,
    #[serde(default)]
    d: PowerDetail,
}

#[derive(Debug, Default, Deserialize)]
struct PowerDetail {
    /// Inner status; 0 is success
    retcode: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
    /// Remaining balance in yuan; string or number depending on the backend
    #[serde(default)]
    syje: Option<serde_json::Value>,
    /// Room billing identifier
    #[serde(default)]
    dffjbh: Option<String>,
    #[serde(rename = "roomName", default)]
    room_name: Option<String>,
}

impl PowerResponse {
    fn is_ok(&self) -> bool {
        self.e == Some(0) && self.d.retcode == Some(0)
    }
}

impl PowerDetail {
    fn balance_yuan(&self) -> Option<f64> {
        match &self.syje {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }
}

pub struct PowerWatcher {
    client: Arc<SsoClient>,
    notifier: Arc<dyn Notifier>,
    refresh_url: String,
    api_url: String,
    threshold_yuan: f64,
}

impl PowerWatcher {
    pub fn new(
        client: Arc<SsoClient>,
        notifier: Arc<dyn Notifier>,
        refresh_url: String,
        api_url: String,
        threshold_yuan: f64,
    ) -> Self {
        Self {
            client,
            notifier,
            refresh_url,
            api_url,
            threshold_yuan,
        }
    }

    async fn fetch_balance(&self) -> Result<PowerResponse, TaskError> {
        let refresh = self.client.http().get(&self.refresh_url).send().await?;
        if refresh.status() != StatusCode::OK {
            warn!(status = %refresh.status(), "service session refresh failed");
            return Err(TaskError::AuthExpired);
        }

        let response = self.client.http().get(&self.api_url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(TaskError::Failed(
                EngineError::InvalidResponse(format!("balance endpoint returned {status}")).into(),
            ));
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|err| TaskError::Failed(anyhow!(err).context("bad balance payload")))
    }
}

#[async_trait]
impl Watcher for PowerWatcher {
    fn name(&self) -> &str {
        "power"
    }

    async fn run(&mut self) -> bool {
        info!("checking power balance");

        let payload =
            match with_retry_on_auth_failure(&self.client, || self.fetch_balance()).await {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "power check failed");
                    return false;
                }
            };

        if !payload.is_ok() {
            warn!(
                message = payload.d.msg.as_deref().unwrap_or("unknown error"),
                "balance query refused upstream"
            );
            return false;
        }

        let detail = payload.d;
        let Some(balance) = detail.balance_yuan() else {
            warn!("balance payload missing a readable amount");
            return false;
        };

        let room = detail.room_name.as_deref().unwrap_or("N/A");
        let room_id = detail.dffjbh.as_deref().unwrap_or("N/A");
        info!(room, room_id, balance, "power balance read");

        if balance < self.threshold_yuan {
            let body = build_email_body(room, room_id, balance, self.threshold_yuan);
            match self.notifier.notify(POWER_ALERT_SUBJECT, &body).await {
                Ok(()) => info!("power alert sent"),
                Err(err) => {
                    warn!(error = %err, "failed to send power alert");
                    return false;
                }
            }
        } else {
            info!(balance, threshold = self.threshold_yuan, "balance sufficient");
        }

        true
    }
}

fn build_email_body(room: &str, room_id: &str, balance: f64, threshold: f64) -> String {
    format!(
        "Your dorm electricity status:\n\
         \n\
         - Room: {room}\n\
         - Billing ID: {room_id}\n\
         - Balance: {balance:.2} yuan\n\
         \n\
         The balance has dropped below {threshold:.2} yuan; top up soon to \
         avoid losing power.\n\
         \n\
         This is an automated alert; do not reply.\n"
    )
}
