//! campus-watch - campus SSO watcher service.
//!
//! Logs in against the campus single-sign-on gateway once at startup, then
//! runs the registered watcher tasks (grades, power balance) on their
//! schedules, sharing the one authenticated session between them.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use campus_watch::auth::SsoClient;
use campus_watch::config::Config;
use campus_watch::notify::{EmailNotifier, Notifier};
use campus_watch::scheduler::{SchedulePolicy, Scheduler};
use campus_watch::watchers::{GradeWatcher, PowerWatcher};

/// How often the scheduler wakes up to check for due tasks
const SCHEDULER_TICK_SECS: u64 = 30;

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g. RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("campus-watch starting");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            eprintln!(
                "required environment variables: CAMPUS_USERNAME, CAMPUS_PASSWORD, \
                 EMAIL_USER, EMAIL_PASSWORD, EMAIL_TO"
            );
            std::process::exit(1);
        }
    };

    let client = Arc::new(SsoClient::new(
        config.username.clone(),
        config.password.clone(),
        config.sso.clone(),
    )?);
    let notifier: Arc<dyn Notifier> = Arc::new(EmailNotifier::new(&config.email)?);

    info!("authenticating against the campus gateway");
    if !client.login().await {
        error!("initial login failed, not starting watchers");
        std::process::exit(1);
    }

    let mut scheduler = Scheduler::new();
    scheduler.add_task(
        SchedulePolicy::Interval {
            seconds: config.power_interval_secs,
        },
        Box::new(PowerWatcher::new(
            client.clone(),
            notifier.clone(),
            config.power_service_url.clone(),
            config.power_api_url.clone(),
            config.power_threshold_yuan,
        )),
    );
    scheduler.add_task(
        SchedulePolicy::Interval {
            seconds: config.grades_interval_secs,
        },
        Box::new(GradeWatcher::new(
            client.clone(),
            notifier.clone(),
            config.grades_service_url.clone(),
            config.grades_api_url.clone(),
            config.grades_history_file.clone(),
        )),
    );

    // First pass right away; every task is due on its first check
    let succeeded = scheduler.run_due_tasks().await;
    info!(succeeded, total = scheduler.task_count(), "initial run finished");

    // Ctrl-C flips the cooperative shutdown flag; the scheduler checks it
    // once per tick and lets in-flight requests run to their timeouts
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    scheduler
        .run(Duration::from_secs(SCHEDULER_TICK_SECS), shutdown_rx)
        .await;

    info!("campus-watch shutting down");
    Ok(())
}
