/*!
SNS notification adapter.

Publishes plain-text run summaries to a topic; a chat-relay subscriber
outside this repository forwards them verbatim.
*/

use async_trait::async_trait;
use aws_sdk_sns::Client as SnsClient;
use tracing::info;

use super::{sdk_error_message, Notifier};
use crate::{Result, VaultError};

/// SNS-backed notifier bound to one topic
#[derive(Debug, Clone)]
pub struct SnsNotifier {
    client: SnsClient,
    topic_arn: String,
}

impl SnsNotifier {
    pub fn new(client: SnsClient, topic_arn: String) -> Self {
        Self { client, topic_arn }
    }

    /// Get the topic ARN
    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn publish(&self, subject: &str, message: &str) -> Result<()> {
        self.client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| VaultError::notification(sdk_error_message("publish", &e)))?;

        info!(topic = %self.topic_arn, subject = %subject, "Published notification");
        Ok(())
    }
}
