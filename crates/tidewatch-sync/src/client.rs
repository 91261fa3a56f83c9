//! HTTP client for the upstream marketplace feed.
//!
//! Translates [`PageQuery`] into the feed's query-string dialect and maps
//! the wire payload into domain events. Wire shapes live in a private
//! module so upstream quirks (naive timestamps, numeric ids) stay at the
//! boundary.

use std::{future::Future, pin::Pin, time::Duration};

use tidewatch_core::models::MarketEvent;
use tracing::info;

use crate::{
    error::{Result, SyncError},
    source::{EventSource, PageQuery},
};

/// Configuration for the marketplace feed client.
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    /// Feed API origin, e.g. `https://api.opensea.io`.
    pub base_url: String,
    /// Events resource path under the origin.
    pub events_path: String,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.opensea.io".to_string(),
            events_path: "api/v1/events".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: "tidewatch/0.3".to_string(),
        }
    }
}

/// Feed client backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    client: reqwest::Client,
    config: MarketplaceConfig,
}

impl MarketplaceClient {
    /// Creates a new feed client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built with the given
    /// settings.
    pub fn new(config: MarketplaceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| SyncError::upstream(format!("failed to build feed client: {e}")))?;

        Ok(Self { client, config })
    }

    fn events_url(&self) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), self.config.events_path)
    }

    async fn retrieve_page(&self, query: PageQuery) -> Result<Vec<MarketEvent>> {
        let url = self.events_url();

        let mut params: Vec<(&str, String)> = vec![
            ("asset_contract_address", query.collection.to_string()),
            ("event_type", query.kind.as_str().to_string()),
            ("only_opensea", query.only_marketplace.to_string()),
            ("offset", query.offset.to_string()),
            ("limit", query.limit.to_string()),
            ("occurred_after", query.occurred_after.to_string()),
        ];
        if let Some(before) = query.occurred_before {
            params.push(("occurred_before", before.to_string()));
        }
        if let Some(auction_type) = query.auction_type {
            params.push(("auction_type", auction_type.as_str().to_string()));
        }

        info!(
            collection = %query.collection,
            kind = %query.kind,
            occurred_after = query.occurred_after,
            occurred_before = ?query.occurred_before,
            limit = query.limit,
            "calling marketplace events feed"
        );

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| SyncError::upstream(format!("events request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::upstream(format!(
                "events request to {url} returned HTTP {status}"
            )));
        }

        let page: wire::EventsPage = response
            .json()
            .await
            .map_err(|e| SyncError::upstream(format!("events response decode failed: {e}")))?;

        page.asset_events.into_iter().map(wire::WireEvent::into_domain).collect()
    }
}

impl EventSource for MarketplaceClient {
    fn fetch_page(
        &self,
        query: PageQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<MarketEvent>>> + Send + '_>> {
        Box::pin(self.retrieve_page(query))
    }
}

mod wire {
    //! Wire representation of the upstream events payload.

    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer};
    use tidewatch_core::models::{
        AssetInfo, AuctionType, CollectionInfo, CollectionKey, EventId, MarketEvent, PaymentToken,
        Wallet,
    };

    use crate::error::SyncError;

    /// The feed wraps each page in an `asset_events` array.
    #[derive(Debug, Deserialize)]
    pub struct EventsPage {
        #[serde(default)]
        pub asset_events: Vec<WireEvent>,
    }

    #[derive(Debug, Deserialize)]
    pub struct WireEvent {
        #[serde(deserialize_with = "string_or_number")]
        pub id: String,
        pub contract_address: String,
        pub event_type: String,
        pub created_date: String,
        #[serde(default)]
        pub auction_type: Option<String>,
        #[serde(default)]
        pub is_private: Option<bool>,
        #[serde(default)]
        pub starting_price: Option<String>,
        #[serde(default)]
        pub ending_price: Option<String>,
        #[serde(default)]
        pub total_price: Option<String>,
        pub payment_token: WirePaymentToken,
        pub seller: WireAccount,
        #[serde(default)]
        pub winner_account: Option<WireAccount>,
        pub asset: WireAsset,
    }

    #[derive(Debug, Deserialize)]
    pub struct WireAsset {
        #[serde(deserialize_with = "string_or_number")]
        pub token_id: String,
        #[serde(default)]
        pub name: Option<String>,
        #[serde(default)]
        pub image_url: Option<String>,
        #[serde(default)]
        pub image_thumbnail_url: Option<String>,
        pub permalink: String,
        pub collection: WireCollection,
    }

    #[derive(Debug, Deserialize)]
    pub struct WireCollection {
        #[serde(default)]
        pub slug: Option<String>,
        #[serde(default)]
        pub image_url: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct WireAccount {
        pub address: String,
        #[serde(default)]
        pub user: Option<WireUser>,
    }

    #[derive(Debug, Deserialize)]
    pub struct WireUser {
        #[serde(default)]
        pub username: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct WirePaymentToken {
        pub symbol: String,
        #[serde(default)]
        pub name: Option<String>,
        #[serde(default)]
        pub eth_price: Option<String>,
        pub usd_price: String,
    }

    impl WireEvent {
        /// Maps the wire shape into the domain event.
        pub fn into_domain(self) -> Result<MarketEvent, SyncError> {
            let created_at = parse_feed_timestamp(&self.created_date)?;
            let kind = self.event_type.parse().map_err(|_| {
                SyncError::upstream(format!("unexpected event type: {}", self.event_type))
            })?;

            Ok(MarketEvent {
                id: EventId(self.id),
                collection: CollectionKey(self.contract_address),
                kind,
                created_at,
                asset: AssetInfo {
                    token_id: self.asset.token_id,
                    name: self.asset.name,
                    image_url: self.asset.image_url,
                    thumbnail_url: self.asset.image_thumbnail_url,
                    permalink: self.asset.permalink,
                    collection: CollectionInfo {
                        slug: self.asset.collection.slug,
                        image_url: self.asset.collection.image_url,
                    },
                },
                seller: wallet(self.seller),
                buyer: self.winner_account.map(wallet),
                starting_price: self.starting_price,
                ending_price: self.ending_price,
                total_price: self.total_price,
                payment_token: PaymentToken {
                    symbol: self.payment_token.symbol,
                    name: self.payment_token.name.unwrap_or_default(),
                    eth_price: self.payment_token.eth_price.unwrap_or_default(),
                    usd_price: self.payment_token.usd_price,
                },
                is_private: self.is_private.unwrap_or(false),
                auction_type: self.auction_type.as_deref().and_then(auction_type),
            })
        }
    }

    fn wallet(account: WireAccount) -> Wallet {
        Wallet { address: account.address, username: account.user.and_then(|u| u.username) }
    }

    fn auction_type(raw: &str) -> Option<AuctionType> {
        match raw {
            "english" => Some(AuctionType::English),
            "dutch" => Some(AuctionType::Dutch),
            "min-price" => Some(AuctionType::MinPrice),
            _ => None,
        }
    }

    /// The feed emits naive timestamps with optional fractional seconds;
    /// they are UTC by contract.
    fn parse_feed_timestamp(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, SyncError> {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| SyncError::upstream(format!("invalid created_date '{raw}': {e}")))
    }

    /// Some feed deployments serialize ids as JSON numbers.
    fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrNumber {
            String(String),
            Number(i64),
        }

        Ok(match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use tidewatch_core::models::{AuctionType, CollectionKey, EventKind};
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_config(server: &MockServer) -> MarketplaceConfig {
        MarketplaceConfig {
            base_url: server.uri(),
            events_path: "api/v1/events".to_string(),
            ..MarketplaceConfig::default()
        }
    }

    fn test_query() -> PageQuery {
        PageQuery {
            collection: CollectionKey::from("0xabc123"),
            kind: EventKind::Successful,
            occurred_after: 1_000,
            occurred_before: Some(2_000),
            offset: 0,
            limit: 50,
            only_marketplace: true,
            auction_type: Some(AuctionType::English),
        }
    }

    fn sample_event_json() -> serde_json::Value {
        serde_json::json!({
            "id": 987654,
            "contract_address": "0xabc123",
            "event_type": "successful",
            "created_date": "2021-09-15T12:34:56.123456",
            "auction_type": "english",
            "is_private": false,
            "total_price": "2500000000000000000",
            "payment_token": {
                "symbol": "ETH",
                "name": "Ether",
                "eth_price": "1.0",
                "usd_price": "3000.00"
            },
            "seller": { "address": "0x1111", "user": { "username": "alice" } },
            "winner_account": { "address": "0x2222", "user": null },
            "asset": {
                "token_id": "42",
                "name": "Wave #42",
                "image_url": "https://img.example/42.png",
                "image_thumbnail_url": "https://img.example/42_thumb.png",
                "permalink": "https://market.example/assets/0xabc123/42",
                "collection": { "slug": "waves", "image_url": "https://img.example/waves.png" }
            }
        })
    }

    #[tokio::test]
    async fn fetches_and_maps_a_page() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("GET"))
            .and(matchers::path("/api/v1/events"))
            .and(matchers::query_param("asset_contract_address", "0xabc123"))
            .and(matchers::query_param("event_type", "successful"))
            .and(matchers::query_param("only_opensea", "true"))
            .and(matchers::query_param("occurred_after", "1000"))
            .and(matchers::query_param("occurred_before", "2000"))
            .and(matchers::query_param("auction_type", "english"))
            .and(matchers::query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "asset_events": [sample_event_json()]
            })))
            .mount(&server)
            .await;

        let client = MarketplaceClient::new(test_config(&server)).unwrap();
        let events = client.fetch_page(test_query()).await.unwrap();

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.id.as_str(), "987654");
        assert_eq!(event.kind, EventKind::Successful);
        assert_eq!(event.created_at.timestamp(), 1_631_709_296);
        assert_eq!(event.seller.username.as_deref(), Some("alice"));
        assert_eq!(event.buyer.as_ref().unwrap().address, "0x2222");
        assert_eq!(event.total_price.as_deref(), Some("2500000000000000000"));
        assert_eq!(event.auction_type, Some(AuctionType::English));
    }

    #[tokio::test]
    async fn omits_upper_bound_when_window_is_open() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "asset_events": [] })),
            )
            .mount(&server)
            .await;

        let client = MarketplaceClient::new(test_config(&server)).unwrap();
        let mut query = test_query();
        query.occurred_before = None;
        let events = client.fetch_page(query).await.unwrap();
        assert!(events.is_empty());

        let requests = server.received_requests().await.unwrap();
        let url = requests[0].url.to_string();
        assert!(url.contains("occurred_after=1000"));
        assert!(!url.contains("occurred_before"));
    }

    #[tokio::test]
    async fn missing_events_array_reads_as_empty_page() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = MarketplaceClient::new(test_config(&server)).unwrap();
        let events = client.fetch_page(test_query()).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn http_error_maps_to_upstream_fetch() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("feed down"))
            .mount(&server)
            .await;

        let client = MarketplaceClient::new(test_config(&server)).unwrap();
        let err = client.fetch_page(test_query()).await.unwrap_err();
        assert!(matches!(err, SyncError::UpstreamFetch { .. }));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn malformed_timestamp_maps_to_upstream_fetch() {
        let server = MockServer::start().await;

        let mut bad_event = sample_event_json();
        bad_event["created_date"] = serde_json::json!("not-a-date");

        Mock::given(matchers::method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "asset_events": [bad_event]
            })))
            .mount(&server)
            .await;

        let client = MarketplaceClient::new(test_config(&server)).unwrap();
        let err = client.fetch_page(test_query()).await.unwrap_err();
        assert!(matches!(err, SyncError::UpstreamFetch { .. }));
    }
}
