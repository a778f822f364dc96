//! Run notifications.
//!
//! A run is summarised into a [`NotificationMessage`] that carries the
//! error and warning counts in its subject and the full run log as an
//! attachment. Delivery goes through the [`Notifier`] trait.

use async_trait::async_trait;
use tracing::info;

use crate::orchestrator::BatchReport;

/// Name of the attached run log.
pub const LOG_ATTACHMENT_NAME: &str = "log.txt";

/// A file attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content: String,
}

/// A rendered run notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

impl NotificationMessage {
    /// Render the notification of a run in environment `env`.
    pub fn from_report(env: &str, report: &BatchReport) -> Self {
        let subject = format!(
            "Reindex [{}] Index - Errors: {} - Warnings: {}",
            env,
            report.error_count(),
            report.warning_count()
        );
        let body = format!("Data reindex run. Forced mode: {}", report.forced);

        Self {
            subject,
            body,
            attachments: vec![Attachment {
                name: LOG_ATTACHMENT_NAME.to_string(),
                content: report.log.render(),
            }],
        }
    }
}

/// Delivers run notifications.
///
/// A notification never fails the run, so implementations log their own
/// delivery problems.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &NotificationMessage);
}

/// Notifier that writes the message to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &NotificationMessage) {
        info!(
            subject = %message.subject,
            body = %message.body,
            attachments = message.attachments.len(),
            "Run notification"
        );
        for attachment in &message.attachments {
            info!(name = %attachment.name, "{}", attachment.content);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_from_report() {
        let mut report = BatchReport::new(true);
        report.log.info(None, "Starting");
        report.log.warn(Some("calles"), "Document without id");
        report.log.error(Some("provincias"), "Could not index from backup");
        report.log.error(Some("provincias"), "Index creation failed");

        let message = NotificationMessage::from_report("prod", &report);

        assert_eq!(message.subject, "Reindex [prod] Index - Errors: 2 - Warnings: 1");
        assert_eq!(message.body, "Data reindex run. Forced mode: true");
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.attachments[0].name, "log.txt");
        assert_eq!(message.attachments[0].content.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_message() {
        let message = NotificationMessage::from_report("dev", &BatchReport::new(false));
        assert_eq!(message.subject, "Reindex [dev] Index - Errors: 0 - Warnings: 0");
        LogNotifier.notify(&message).await;
    }
}
