//! Marketplace event model and strongly-typed identifiers.
//!
//! Events are immutable once observed: the engine upserts them exactly as
//! fetched and never mutates them afterwards. Identity lives in [`EventId`],
//! which is the dedup key across pages, runs, and storage.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Upstream-assigned event identifier.
///
/// Globally unique across the feed and the source of truth for
/// deduplication. Wraps the upstream's string id to prevent mixing with
/// other string-shaped values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    /// Returns the raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for EventId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Collection (asset contract) identifier a sync is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionKey(pub String);

impl CollectionKey {
    /// Returns the raw collection key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CollectionKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for CollectionKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Kind of marketplace activity an event records.
///
/// `Created` is a new listing, `Successful` a completed sale. The wire
/// values match the upstream feed's `event_type` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A new listing was created.
    Created,
    /// A sale completed.
    Successful,
}

impl EventKind {
    /// Wire value used by the upstream feed and the store.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Successful => "successful",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "successful" => Ok(Self::Successful),
            other => Err(CoreError::InvalidInput(format!("unknown event kind: {other}"))),
        }
    }
}

/// Auction mechanism filter accepted by the upstream feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuctionType {
    /// Ascending-price auction.
    English,
    /// Descending-price auction.
    Dutch,
    /// Fixed minimum price listing.
    MinPrice,
}

impl AuctionType {
    /// Wire value used by the upstream feed.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Dutch => "dutch",
            Self::MinPrice => "min-price",
        }
    }
}

impl fmt::Display for AuctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One listing or sale observed from the marketplace feed.
///
/// `created_at` is the total order used for pagination windows and
/// watermarking; ties between events sharing a timestamp are resolved by
/// upstream page order, which dedup makes harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    /// Upstream-assigned unique id, the dedup key.
    pub id: EventId,
    /// Collection the asset belongs to.
    pub collection: CollectionKey,
    /// Listing or sale.
    pub kind: EventKind,
    /// When the event occurred upstream, UTC.
    pub created_at: DateTime<Utc>,
    /// The traded asset.
    pub asset: AssetInfo,
    /// Selling wallet.
    pub seller: Wallet,
    /// Buying wallet, present only for sales.
    pub buyer: Option<Wallet>,
    /// Listing start price in the payment token's smallest unit.
    pub starting_price: Option<String>,
    /// Listing end price in the payment token's smallest unit.
    pub ending_price: Option<String>,
    /// Sale total in the payment token's smallest unit.
    pub total_price: Option<String>,
    /// Token the price fields are denominated in.
    pub payment_token: PaymentToken,
    /// Whether the listing was private.
    pub is_private: bool,
    /// Auction mechanism, when the feed reports one.
    pub auction_type: Option<AuctionType>,
}

/// Descriptor of the asset an event concerns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Token id within the collection.
    pub token_id: String,
    /// Display name, absent for unnamed tokens.
    pub name: Option<String>,
    /// Full-size media URL.
    pub image_url: Option<String>,
    /// Thumbnail media URL.
    pub thumbnail_url: Option<String>,
    /// Marketplace page for the asset.
    pub permalink: String,
    /// Parent collection metadata.
    pub collection: CollectionInfo,
}

/// Parent collection metadata carried on each asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Marketplace slug of the collection.
    pub slug: Option<String>,
    /// Collection image URL, used as the notification author icon.
    pub image_url: Option<String>,
}

/// Wallet taking part in an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// On-chain address.
    pub address: String,
    /// Marketplace display name, when the wallet has one.
    pub username: Option<String>,
}

/// Payment token an event's prices are denominated in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentToken {
    /// Ticker symbol, e.g. "ETH".
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Exchange rate to ETH, decimal string.
    pub eth_price: String,
    /// Exchange rate to USD, decimal string.
    pub usd_price: String,
}

/// Webhook delivery token identifying one notification target.
///
/// The token is a credential; `Display` truncates it so it never lands in
/// logs in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebhookTarget(pub String);

impl WebhookTarget {
    /// Returns the full delivery token for transport use.
    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WebhookTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self.0.chars().take(8).collect::<String>();
        write!(f, "{shown}…")
    }
}

impl From<&str> for WebhookTarget {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Explicit pagination window override, epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Lower bound, inclusive.
    pub after: i64,
    /// Upper bound, exclusive; `None` leaves the window open-ended.
    pub before: Option<i64>,
}

/// Input to one sync invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Collection to sync.
    pub collection: CollectionKey,
    /// Event kind to sync.
    pub kind: EventKind,
    /// Restrict to marketplace-native auctions.
    #[serde(default = "default_only_marketplace")]
    pub only_marketplace_auctions: bool,
    /// Auction mechanism filter.
    #[serde(default = "default_auction_type")]
    pub auction_type: Option<AuctionType>,
    /// Upstream page size per fetch.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Maximum total events to gather across pages.
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    /// Explicit window override; normally derived from the watermark.
    #[serde(default)]
    pub window: Option<TimeWindow>,
    /// Webhook targets to notify with the gathered batch.
    #[serde(default)]
    pub targets: Vec<WebhookTarget>,
}

impl SyncRequest {
    /// Creates a request for one (collection, kind) pair with defaults.
    pub fn new(collection: impl Into<CollectionKey>, kind: EventKind) -> Self {
        Self {
            collection: collection.into(),
            kind,
            only_marketplace_auctions: default_only_marketplace(),
            auction_type: default_auction_type(),
            page_size: default_page_size(),
            max_events: default_max_events(),
            window: None,
            targets: Vec::new(),
        }
    }
}

fn default_only_marketplace() -> bool {
    true
}

fn default_auction_type() -> Option<AuctionType> {
    Some(AuctionType::English)
}

fn default_page_size() -> usize {
    50
}

fn default_max_events() -> usize {
    200
}
