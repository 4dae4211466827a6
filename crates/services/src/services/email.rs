//! Outbound notification email.
//!
//! [`EmailService`] renders the templates and hands the message to a
//! [`Mailer`]. Sending is strictly best-effort: failures are logged and
//! swallowed so a mail outage never fails the request that triggered it.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use utils::text::squash_whitespace;

use super::config::EmailConfig;

#[derive(Debug, Clone, Error)]
pub enum EmailError {
    #[error("could not reach the mail endpoint: {0}")]
    Unreachable(String),
    #[error("mail endpoint took too long")]
    TimedOut,
    #[error("mail endpoint answered {status}: {detail}")]
    Rejected { status: u16, detail: String },
}

impl EmailError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::TimedOut => true,
            Self::Rejected { status, .. } => *status >= 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Posts the message as JSON to a provider webhook.
pub struct HttpMailer {
    http: Client,
    endpoint: String,
}

impl HttpMailer {
    const SEND_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(endpoint: String) -> Result<Self, EmailError> {
        let http = Client::builder()
            .timeout(Self::SEND_TIMEOUT)
            .user_agent(concat!("seo-pm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EmailError::Unreachable(e.to_string()))?;
        Ok(Self { http, endpoint })
    }

    async fn post(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let res = self
            .http
            .post(&self.endpoint)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmailError::TimedOut
                } else {
                    EmailError::Unreachable(e.to_string())
                }
            })?;

        let status = res.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(EmailError::Rejected {
                status: status.as_u16(),
                detail: res.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        (|| async { self.post(message).await })
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(10))
                    .with_max_times(2)
                    .with_jitter(),
            )
            .when(EmailError::is_transient)
            .notify(|err, delay| warn!(%err, ?delay, "mail send failed, backing off"))
            .await
    }
}

/// Used when email is disabled; logs and drops the message.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        debug!(to = %message.to, subject = %message.subject, "email disabled, dropping message");
        Ok(())
    }
}

pub fn task_assigned_email(task_name: &str, project_name: &str) -> (String, String) {
    // Task names are user-entered and may span lines; subjects must not.
    let task_name = squash_whitespace(task_name);
    (
        format!("New task assigned: {task_name}"),
        format!("You have been assigned \"{task_name}\" on the {project_name} project."),
    )
}

pub fn task_completed_email(task_name: &str, completed_by: &str) -> (String, String) {
    let task_name = squash_whitespace(task_name);
    (
        format!("Task completed: {task_name}"),
        format!("{completed_by} marked \"{task_name}\" as done."),
    )
}

pub fn badge_awarded_email(badge_title: &str) -> (String, String) {
    (
        format!("Badge earned: {badge_title}"),
        format!("Congratulations, you just earned the \"{badge_title}\" badge."),
    )
}

pub fn suggestions_ready_email(project_name: &str, count: usize) -> (String, String) {
    (
        format!("Task suggestions ready for {project_name}"),
        format!("{count} new task suggestions are waiting for review on {project_name}."),
    )
}

#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    from_address: String,
}

impl EmailService {
    pub fn new(mailer: Arc<dyn Mailer>, from_address: String) -> Self {
        Self {
            mailer,
            from_address,
        }
    }

    /// Pick the transport from config: HTTP when enabled with an endpoint,
    /// no-op otherwise (including when the HTTP client cannot be built).
    pub fn from_config(config: &EmailConfig) -> Self {
        let mailer: Arc<dyn Mailer> = match (&config.enabled, &config.endpoint) {
            (true, Some(endpoint)) => match HttpMailer::new(endpoint.clone()) {
                Ok(mailer) => Arc::new(mailer),
                Err(err) => {
                    warn!(%err, "falling back to no-op mailer");
                    Arc::new(NoopMailer)
                }
            },
            _ => Arc::new(NoopMailer),
        };
        Self::new(mailer, config.from_address.clone())
    }

    /// Send one message, best-effort.
    pub async fn notify(&self, to: &str, subject: String, body: String) {
        let message = EmailMessage {
            to: to.to_string(),
            from: self.from_address.clone(),
            subject,
            body,
        };
        match self.mailer.send(&message).await {
            Ok(()) => info!(to = %message.to, subject = %message.subject, "email sent"),
            Err(err) => warn!(to = %message.to, %err, "email send failed"),
        }
    }

    pub async fn task_assigned(&self, to: &str, task_name: &str, project_name: &str) {
        let (subject, body) = task_assigned_email(task_name, project_name);
        self.notify(to, subject, body).await;
    }

    pub async fn task_completed(&self, to: &str, task_name: &str, completed_by: &str) {
        let (subject, body) = task_completed_email(task_name, completed_by);
        self.notify(to, subject, body).await;
    }

    pub async fn badge_awarded(&self, to: &str, badge_title: &str) {
        let (subject, body) = badge_awarded_email(badge_title);
        self.notify(to, subject, body).await;
    }

    pub async fn suggestions_ready(&self, to: &str, project_name: &str, count: usize) {
        let (subject, body) = suggestions_ready_email(project_name, count);
        self.notify(to, subject, body).await;
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Mutex;

    use super::*;

    /// Records messages instead of sending them.
    struct CapturingMailer {
        sent: Mutex<Vec<EmailMessage>>,
    }

    impl CapturingMailer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Mailer for CapturingMailer {
        async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
            self.sent.lock().await.push(message.clone());
            Ok(())
        }
    }

    /// Always fails, to prove the service swallows transport errors.
    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _message: &EmailMessage) -> Result<(), EmailError> {
            Err(EmailError::Unreachable("connection refused".to_string()))
        }
    }

    #[test]
    fn templates_mention_their_subjects() {
        let (subject, body) = task_assigned_email("Fix crawl errors", "Acme SEO");
        assert!(subject.contains("Fix crawl errors"));
        assert!(body.contains("Acme SEO"));

        let (subject, _) = badge_awarded_email("Task Master");
        assert!(subject.contains("Task Master"));

        let (_, body) = suggestions_ready_email("Acme SEO", 4);
        assert!(body.contains("4 new task suggestions"));
    }

    #[test]
    fn multiline_task_names_are_flattened_in_subjects() {
        let (subject, _) = task_assigned_email("Fix\ncrawl  errors", "Acme SEO");
        assert_eq!(subject, "New task assigned: Fix crawl errors");
    }

    #[tokio::test]
    async fn service_fills_in_the_from_address() {
        let mailer = CapturingMailer::new();
        let service = EmailService::new(mailer.clone(), "noreply@agency.test".to_string());

        service
            .task_assigned("client@acme.test", "Fix crawl errors", "Acme SEO")
            .await;

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "noreply@agency.test");
        assert_eq!(sent[0].to, "client@acme.test");
    }

    #[tokio::test]
    async fn send_failures_do_not_propagate() {
        let service = EmailService::new(Arc::new(FailingMailer), "noreply@agency.test".to_string());
        // Must simply return; the request path never sees mail errors.
        service.badge_awarded("client@acme.test", "Task Master").await;
    }

    #[tokio::test]
    async fn disabled_config_selects_the_noop_mailer() {
        let config = EmailConfig::default();
        let service = EmailService::from_config(&config);
        service.notify("client@acme.test", "s".into(), "b".into()).await;
    }
}
