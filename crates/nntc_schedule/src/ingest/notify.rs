//! Fan-out of "schedule updated" messages to every known contact.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use super::error::NotifyError;
use crate::db::UserContact;

/// Delivers one message to one chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, chat_id: i64, message: &str) -> Result<(), NotifyError>;
}

/// Logs instead of delivering. Used when no webhook is configured.
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send(&self, chat_id: i64, message: &str) -> Result<(), NotifyError> {
        info!(chat_id, message, "Schedule update notification");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    chat_id: i64,
    text: &'a str,
}

/// POSTs `{"chat_id": .., "text": ..}` to the bot's delivery endpoint.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, chat_id: i64, message: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload {
                chat_id,
                text: message,
            })
            .send()
            .await
            .map_err(|e| NotifyError::Delivery {
                chat_id,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                chat_id,
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Sends `message` to every contact, at most `concurrency` at a time.
///
/// A failed delivery is logged and counted; it does not stop the others.
pub async fn notify_all(
    notifier: &dyn Notifier,
    contacts: &[UserContact],
    message: &str,
    concurrency: usize,
) -> FanOutReport {
    // Built eagerly; created inside `StreamExt::map` the fan-out is not `Send`.
    let deliveries: Vec<_> = contacts
        .iter()
        .map(|contact| notifier.send(contact.chat_id, message))
        .collect();

    let results: Vec<Result<(), NotifyError>> = stream::iter(deliveries)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = FanOutReport::default();
    for result in results {
        match result {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(error = %e, "Notification delivery failed");
                report.failed += 1;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records deliveries and fails for a fixed set of chats.
    struct FlakyNotifier {
        failing: Vec<i64>,
        sent: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn send(&self, chat_id: i64, _message: &str) -> Result<(), NotifyError> {
            if self.failing.contains(&chat_id) {
                return Err(NotifyError::Delivery {
                    chat_id,
                    message: "bot was blocked by the user".to_string(),
                });
            }
            self.sent.lock().unwrap().push(chat_id);
            Ok(())
        }
    }

    fn contacts(ids: &[i64]) -> Vec<UserContact> {
        ids.iter()
            .map(|&chat_id| UserContact {
                chat_id,
                last_interaction: Utc::now(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_fan_out() {
        let notifier = FlakyNotifier {
            failing: vec![2, 4],
            sent: Mutex::new(Vec::new()),
        };

        let report = notify_all(&notifier, &contacts(&[1, 2, 3, 4, 5]), "обновлено", 2).await;

        assert_eq!(report, FanOutReport { delivered: 3, failed: 2 });
        let mut sent = notifier.sent.lock().unwrap().clone();
        sent.sort();
        assert_eq!(sent, vec![1, 3, 5]);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_fan_out_future_is_send() {
        let notifier = LoggingNotifier;
        let contacts = contacts(&[1]);
        let fan_out = notify_all(&notifier, &contacts, "обновлено", 1);
        assert_send(&fan_out);
        assert_eq!(fan_out.await.delivered, 1);
    }

    #[tokio::test]
    async fn test_no_contacts() {
        let report = notify_all(&LoggingNotifier, &[], "обновлено", 4).await;
        assert_eq!(report, FanOutReport::default());
    }

    #[tokio::test]
    async fn test_webhook_posts_per_contact() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(body_partial_json(serde_json::json!({ "chat_id": 10, "text": "обновлено" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(body_partial_json(serde_json::json!({ "chat_id": 11 })))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(format!("{}/send", server.uri())).unwrap();
        let report = notify_all(&notifier, &contacts(&[10, 11]), "обновлено", 4).await;

        assert_eq!(report, FanOutReport { delivered: 1, failed: 1 });
    }
}
