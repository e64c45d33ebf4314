//! Service configuration.
//!
//! Credentials and the email settings come from the environment (a `.env`
//! file is honored via `dotenvy` in `main`); every gateway and service URL
//! has a baked-in campus default that can be overridden the same way.
//! Missing required variables are collected and reported together so a
//! fresh deployment fails with one actionable message instead of five.

use std::path::PathBuf;

use crate::api::error::EngineError;
use crate::auth::SsoEndpoints;

// Campus defaults. Every one of these can be overridden from the
// environment for testing or for a different gateway deployment.
const DEFAULT_LOGIN_URL: &str = "https://idas.uestc.edu.cn/authserver/login";
const DEFAULT_CAPTCHA_CHECK_URL: &str =
    "https://idas.uestc.edu.cn/authserver/checkNeedCaptcha.htl";
const DEFAULT_FINGERPRINT_URL: &str =
    "https://idas.uestc.edu.cn/authserver/bfp/info?bfp=1AEE9A6A77D6CAA491AFA55B9EF54C34";
const DEFAULT_GRADES_SERVICE_URL: &str = "https://idas.uestc.edu.cn/authserver/login?service=https%3A%2F%2Feamsapp.uestc.edu.cn%2Fapi%2Fblade-auth%2Fcas-login%3FredirectUrl%3Dhttps%3A%2F%2Feamsapp.uestc.edu.cn";
const DEFAULT_GRADES_API_URL: &str = "https://eamsapp.uestc.edu.cn/api/ydzc-app/grade/student";
const DEFAULT_POWER_SERVICE_URL: &str = "https://idas.uestc.edu.cn/authserver/login?service=https%3A%2F%2Fonline.uestc.edu.cn%2Fcommon%2FactionCasLogin%3Fredirect_url%3Dhttps%253A%252F%252Fonline.uestc.edu.cn%252Fpage%252F";
const DEFAULT_POWER_API_URL: &str = "https://online.uestc.edu.cn/site/bedroom";
const DEFAULT_SMTP_HOST: &str = "smtp.163.com";
const DEFAULT_HISTORY_FILE: &str = "sent_grades.json";

/// Alert when the power balance drops below this many yuan
const DEFAULT_POWER_THRESHOLD_YUAN: f64 = 10.0;

/// Check grades hourly, power every half hour
const DEFAULT_GRADES_INTERVAL_SECS: u64 = 3600;
const DEFAULT_POWER_INTERVAL_SECS: u64 = 1800;

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub user: String,
    pub password: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub username: String,
    pub password: String,
    pub sso: SsoEndpoints,
    pub grades_service_url: String,
    pub grades_api_url: String,
    pub power_service_url: String,
    pub power_api_url: String,
    pub email: EmailConfig,
    pub power_threshold_yuan: f64,
    pub grades_history_file: PathBuf,
    pub grades_interval_secs: u64,
    pub power_interval_secs: u64,
}

impl Config {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load via an arbitrary variable lookup (injected for tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let mut missing = Vec::new();
        let mut required = |key: &'static str| match lookup(key) {
            Some(value) if !value.is_empty() => value,
            _ => {
                missing.push(key);
                String::new()
            }
        };

        let username = required("CAMPUS_USERNAME");
        let password = required("CAMPUS_PASSWORD");
        let email_user = required("EMAIL_USER");
        let email_password = required("EMAIL_PASSWORD");
        let email_to = required("EMAIL_TO");

        if !missing.is_empty() {
            return Err(EngineError::Configuration(missing.join(", ")));
        }

        let or_default = |key: &str, default: &str| {
            lookup(key).filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            username,
            password,
            sso: SsoEndpoints {
                login_url: or_default("CAMPUS_LOGIN_URL", DEFAULT_LOGIN_URL),
                captcha_check_url: or_default("CAMPUS_CAPTCHA_CHECK_URL", DEFAULT_CAPTCHA_CHECK_URL),
                fingerprint_url: or_default("CAMPUS_FINGERPRINT_URL", DEFAULT_FINGERPRINT_URL),
            },
            grades_service_url: or_default("GRADES_SERVICE_URL", DEFAULT_GRADES_SERVICE_URL),
            grades_api_url: or_default("GRADES_API_URL", DEFAULT_GRADES_API_URL),
            power_service_url: or_default("POWER_SERVICE_URL", DEFAULT_POWER_SERVICE_URL),
            power_api_url: or_default("POWER_API_URL", DEFAULT_POWER_API_URL),
            email: EmailConfig {
                smtp_host: or_default("SMTP_HOST", DEFAULT_SMTP_HOST),
                user: email_user,
                password: email_password,
                to: email_to,
            },
            power_threshold_yuan: lookup("POWER_THRESHOLD_YUAN")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_POWER_THRESHOLD_YUAN),
            grades_history_file: PathBuf::from(or_default(
                "GRADES_HISTORY_FILE",
                DEFAULT_HISTORY_FILE,
            )),
            grades_interval_secs: lookup("GRADES_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_GRADES_INTERVAL_SECS),
            power_interval_secs: lookup("POWER_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_POWER_INTERVAL_SECS),
        })
    }
}
