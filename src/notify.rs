use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::TokenPurpose;

/// Payload handed to the dispatcher when a token is issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub email: String,
    pub token: String,
    pub purpose: TokenPurpose,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), String>;
}

/// POSTs notifications to the send endpoint, which renders and delivers the email.
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
    secret: String,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>, secret: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            url: url.into(),
            secret: secret.into(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), String> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.secret)
            .json(notification)
            .send()
            .await
            .map_err(|e| format!("Send endpoint unreachable: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Send endpoint returned {status}"));
        }

        Ok(())
    }
}
