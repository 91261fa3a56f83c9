//! HTTP webhook client.
//!
//! Posts notification payloads to `{base_url}/{token}`. Over-limit (429)
//! responses surface as the recoverable `RateLimited` error with the
//! provider's backoff guidance attached; every other failure is fatal for
//! the dispatch call. The delivery token is a credential and never appears
//! in logs in full.

use std::{collections::HashMap, future::Future, pin::Pin, time::Duration};

use tidewatch_core::models::WebhookTarget;
use tracing::{debug, warn};

use crate::{
    error::{DispatchError, Result},
    message::Notification,
    transport::{NotificationTransport, TransportResponse, RETRY_AFTER_HEADER},
};

/// Configuration for the webhook client.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Webhook API origin the target tokens hang off of.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent sent with every delivery.
    pub user_agent: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            base_url: "https://discord.com/api/webhooks".to_string(),
            timeout: Duration::from_secs(10),
            user_agent: "tidewatch/0.3".to_string(),
        }
    }
}

/// Webhook delivery client backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookClient {
    /// Creates a new webhook client.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] if the HTTP client cannot be
    /// built.
    pub fn new(config: WebhookConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                DispatchError::configuration(format!("failed to build webhook client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    async fn deliver(
        &self,
        notification: Notification,
        target: WebhookTarget,
    ) -> Result<TransportResponse> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), target.token());

        debug!(target = %target, "posting webhook notification");

        let response = self
            .client
            .post(&url)
            .json(&notification)
            .send()
            .await
            .map_err(|e| DispatchError::network(format!("webhook request failed: {e}")))?;

        let status = response.status();
        let headers = lowercase_headers(response.headers());

        if status.as_u16() == 429 {
            let retry_after_ms =
                headers.get(RETRY_AFTER_HEADER).and_then(|v| v.trim().parse::<u64>().ok());
            warn!(target = %target, retry_after_ms, "webhook returned over-limit response");
            return Err(DispatchError::rate_limited(retry_after_ms));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::transport(status.as_u16(), truncate_body(&body)));
        }

        Ok(TransportResponse { status: status.as_u16(), headers })
    }
}

impl NotificationTransport for WebhookClient {
    fn post(
        &self,
        notification: Notification,
        target: WebhookTarget,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse>> + Send + '_>> {
        Box::pin(self.deliver(notification, target))
    }
}

fn lowercase_headers(header_map: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    header_map
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}

fn truncate_body(body: &str) -> String {
    const MAX_BODY: usize = 512;
    if body.len() > MAX_BODY {
        let cut: String = body.chars().take(MAX_BODY).collect();
        format!("{cut}... (truncated)")
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::message::{Embed, EmbedAuthor, EmbedFooter, EmbedThumbnail};

    fn test_client(server: &MockServer) -> WebhookClient {
        WebhookClient::new(WebhookConfig {
            base_url: server.uri(),
            ..WebhookConfig::default()
        })
        .unwrap()
    }

    fn test_notification() -> Notification {
        Notification {
            content: None,
            embeds: vec![Embed {
                author: EmbedAuthor { name: "0xabc".to_string(), icon_url: None },
                title: "Wave #1 Sold for 1 ETH".to_string(),
                url: "https://market.example/assets/0xabc/1".to_string(),
                color: 3_115_751,
                thumbnail: EmbedThumbnail { url: None },
                fields: Vec::new(),
                footer: EmbedFooter {
                    text: "tidewatch".to_string(),
                    icon_url: "https://img.example/icon.png".to_string(),
                },
            }],
        }
    }

    #[tokio::test]
    async fn posts_to_token_path_and_returns_headers() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path("/token-123/abc"))
            .and(matchers::header("content-type", "application/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("x-ratelimit-remaining", "4")
                    .append_header("x-ratelimit-reset", "1700000001"),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        let response = client
            .post(test_notification(), WebhookTarget::from("token-123/abc"))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.rate_limit_remaining(), Some(4));
        assert_eq!(response.rate_limit_reset_epoch(), Some(1_700_000_001));
    }

    #[tokio::test]
    async fn over_limit_response_maps_to_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(429).append_header("retry-after", "1500"))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err =
            client.post(test_notification(), WebhookTarget::from("t")).await.unwrap_err();

        assert!(matches!(err, DispatchError::RateLimited { retry_after_ms: Some(1500) }));
    }

    #[tokio::test]
    async fn over_limit_without_guidance_has_no_retry_after() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err =
            client.post(test_notification(), WebhookTarget::from("t")).await.unwrap_err();

        assert!(matches!(err, DispatchError::RateLimited { retry_after_ms: None }));
    }

    #[tokio::test]
    async fn server_error_maps_to_transport_failure() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err =
            client.post(test_notification(), WebhookTarget::from("t")).await.unwrap_err();

        match err {
            DispatchError::Transport { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("upstream exploded"));
            },
            other => panic!("expected transport error, got {other:?}"),
        }
    }
}
