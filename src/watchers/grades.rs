//! Grade watcher: emails once per newly published course grade.
//!
//! The grades API sits behind a CAS bridge, so each check derives a fresh
//! bearer token from the shared session first. Already-notified courses are
//! remembered in a small JSON history file; history is only persisted after
//! a notification actually went out, so a failed send is retried on the
//! next run.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{info, warn};

use crate::api::{derive_token, EngineError};
use crate::auth::{with_retry_on_auth_failure, SsoClient, TaskError};
use crate::notify::Notifier;
use crate::watchers::Watcher;

const GRADE_ALERT_SUBJECT: &str = "[Grade alert] new course grades published";

/// Header the grades API expects its bearer token in
const AUTH_HEADER: &str = "blade-auth";

#[derive(Debug, Deserialize)]
struct GradesResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<Grade>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Grade {
    #[serde(rename = "courseName", default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub score: Option<serde_json::Value>,
    #[serde(default)]
    pub gpa: Option<serde_json::Value>,
}

impl Grade {
    /// Scores and GPAs arrive as numbers or strings depending on whether
    /// the grade is finalized; render either without the JSON quoting
    fn display(value: &Option<serde_json::Value>, fallback: &str) -> String {
        match value {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => fallback.to_string(),
        }
    }
}

/// Course names we already notified about, persisted as a JSON list
pub struct SentHistory {
    path: PathBuf,
    courses: HashSet<String>,
}

impl SentHistory {
    /// Load from disk; a missing or malformed file starts an empty history
    pub fn load(path: PathBuf) -> Self {
        let courses = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Vec<String>>(&contents) {
                Ok(list) => list.into_iter().collect(),
                Err(err) => {
                    warn!(error = %err, path = %path.display(), "malformed history file, starting fresh");
                    HashSet::new()
                }
            },
            Err(_) => HashSet::new(),
        };
        Self { path, courses }
    }

    pub fn contains(&self, course: &str) -> bool {
        self.courses.contains(course)
    }

    pub fn insert(&mut self, course: &str) {
        self.courses.insert(course.to_string());
    }

    pub fn save(&self) -> Result<()> {
        let mut list: Vec<&String> = self.courses.iter().collect();
        list.sort();
        let contents = serde_json::to_string_pretty(&list)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, contents).context("failed to write grade history file")?;
        Ok(())
    }
}

pub struct GradeWatcher {
    client: Arc<SsoClient>,
    notifier: Arc<dyn Notifier>,
    service_login_url: String,
    api_url: String,
    history: SentHistory,
}

impl GradeWatcher {
    pub fn new(
        client: Arc<SsoClient>,
        notifier: Arc<dyn Notifier>,
        service_login_url: String,
        api_url: String,
        history_path: PathBuf,
    ) -> Self {
        Self {
            client,
            notifier,
            service_login_url,
            api_url,
            history: SentHistory::load(history_path),
        }
    }

    async fn fetch_grades(&self) -> Result<Vec<Grade>, TaskError> {
        // A missing token means the session stopped being accepted by the
        // CAS bridge; signal that so the supervisor re-logs-in once
        let token = derive_token(&self.client, &self.service_login_url)
            .await
            .ok_or(TaskError::AuthExpired)?;

        let response = self
            .client
            .http()
            .get(&self.api_url)
            .header(AUTH_HEADER, &token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(TaskError::AuthExpired);
        }

        let payload: GradesResponse = response
            .json()
            .await
            .map_err(|err| TaskError::Failed(anyhow!(err).context("bad grades payload")))?;

        if payload.code != 200 || !payload.success {
            return Err(TaskError::Failed(
                EngineError::InvalidResponse(format!(
                    "grades API refused the request (code {})",
                    payload.code
                ))
                .into(),
            ));
        }

        Ok(payload.data)
    }
}

#[async_trait]
impl Watcher for GradeWatcher {
    fn name(&self) -> &str {
        "grades"
    }

    async fn run(&mut self) -> bool {
        info!("checking for new grades");

        let grades = match with_retry_on_auth_failure(&self.client, || self.fetch_grades()).await {
            Ok(grades) => grades,
            Err(err) => {
                warn!(error = %err, "grade check failed");
                return false;
            }
        };

        if grades.is_empty() {
            warn!("grades API returned no data");
            return false;
        }

        let new_grades: Vec<&Grade> = grades
            .iter()
            .filter(|grade| match grade.course_name.as_deref() {
                Some(name) if !name.is_empty() => !self.history.contains(name),
                _ => false,
            })
            .collect();

        if new_grades.is_empty() {
            info!("no new grades");
            return true;
        }

        info!(count = new_grades.len(), "new grades found");
        let body = build_email_body(&new_grades);

        match self.notifier.notify(GRADE_ALERT_SUBJECT, &body).await {
            Ok(()) => {
                for grade in &new_grades {
                    if let Some(name) = &grade.course_name {
                        self.history.insert(name);
                    }
                }
                if let Err(err) = self.history.save() {
                    warn!(error = %err, "failed to persist grade history");
                }
                info!("grade alert sent");
                true
            }
            Err(err) => {
                // History untouched: these courses are retried next run
                warn!(error = %err, "failed to send grade alert");
                false
            }
        }
    }
}

fn build_email_body(new_grades: &[&Grade]) -> String {
    let mut lines = vec!["New course grades have been published:".to_string(), String::new()];
    for grade in new_grades {
        let name = grade.course_name.as_deref().unwrap_or("unknown course");
        lines.push(format!(
            "- {}: {} (GPA: {})",
            name,
            Grade::display(&grade.score, "pending"),
            Grade::display(&grade.gpa, "N/A"),
        ));
    }
    lines.push(String::new());
    lines.push("This is an automated alert; do not reply.".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grades_response() {
        let json = r#"{
            "code": 200,
            "success": true,
            "data": [
                {"courseName": "Calculus II", "score": 92, "gpa": 4.0},
                {"courseName": "Circuits", "score": "pending"}
            ]
        }"#;
        let parsed: GradesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.code, 200);
        assert!(parsed.success);
        assert_eq!(parsed.data.len(), 2);
        assert_eq!(parsed.data[0].course_name.as_deref(), Some("Calculus II"));
    }

    #[test]
    fn test_grade_display_handles_numbers_and_strings() {
        let numeric: Option<serde_json::Value> = Some(serde_json::json!(92));
        let text: Option<serde_json::Value> = Some(serde_json::json!("pending"));
        assert_eq!(Grade::display(&numeric, "?"), "92");
        assert_eq!(Grade::display(&text, "?"), "pending");
        assert_eq!(Grade::display(&None, "?"), "?");
    }

    #[test]
    fn test_email_body_lists_each_grade() {
        let a = Grade {
            course_name: Some("Calculus II".into()),
            score: Some(serde_json::json!(92)),
            gpa: Some(serde_json::json!(4.0)),
        };
        let body = build_email_body(&[&a]);
        assert!(body.contains("- Calculus II: 92 (GPA: 4.0)"));
    }

    #[test]
    fn test_history_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "campus-watch-history-{}-{}.json",
            std::process::id(),
            "round_trip"
        ));
        let _ = std::fs::remove_file(&path);

        let mut history = SentHistory::load(path.clone());
        assert!(!history.contains("Calculus II"));
        history.insert("Calculus II");
        history.save().unwrap();

        let reloaded = SentHistory::load(path.clone());
        assert!(reloaded.contains("Calculus II"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_malformed_history_starts_fresh() {
        let path = std::env::temp_dir().join(format!(
            "campus-watch-history-{}-{}.json",
            std::process::id(),
            "malformed"
        ));
        std::fs::write(&path, "{not json").unwrap();
        let history = SentHistory::load(path.clone());
        assert!(!history.contains("anything"));
        let _ = std::fs::remove_file(&path);
    }
}
