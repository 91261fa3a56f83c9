//! Webhook message model and event formatting.
//!
//! The payload is the embed dialect the messaging provider expects:
//! one embed per event with author, title, thumbnail, seller/buyer fields,
//! and a footer. Price fields arrive denominated in the payment token's
//! smallest unit; only the reference currency is scaled down and given a
//! USD line.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tidewatch_core::models::{EventKind, MarketEvent, Wallet};

/// Embed accent color used for every notification.
const EMBED_COLOR: u32 = 3_115_751;

/// Footer icon attached to every notification.
const FOOTER_ICON: &str =
    "https://emojipedia-us.s3.dualstack.us-west-1.amazonaws.com/thumbs/120/apple/285/rocket_1f680.png";

/// Smallest-unit scale of the reference currency (wei per token).
const SMALLEST_UNIT_SCALE: f64 = 1e18;

/// One webhook message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Plain-text content; unused, the embeds carry everything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Rich embeds, one per notification.
    pub embeds: Vec<Embed>,
}

/// Rich embed block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    /// Collection attribution line.
    pub author: EmbedAuthor,
    /// Headline: asset, action, and price.
    pub title: String,
    /// Link target for the title.
    pub url: String,
    /// Accent color.
    pub color: u32,
    /// Asset thumbnail.
    pub thumbnail: EmbedThumbnail,
    /// Seller/buyer/price detail fields.
    pub fields: Vec<EmbedField>,
    /// Service footer.
    pub footer: EmbedFooter,
}

/// Embed author line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedAuthor {
    /// Collection key.
    pub name: String,
    /// Collection image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// Embed thumbnail reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedThumbnail {
    /// Thumbnail URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One labeled detail field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    /// Field label.
    pub name: String,
    /// Field value, may contain markdown.
    pub value: String,
    /// Render inline with neighbors.
    pub inline: bool,
}

/// Embed footer line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    /// Footer text.
    pub text: String,
    /// Footer icon URL.
    pub icon_url: String,
}

/// Human label for an event kind.
pub fn notification_label(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Created => "Listed",
        EventKind::Successful => "Sold",
    }
}

/// Shortens a wallet address to its `first4...last4` form.
pub fn truncate_address(address: &str) -> String {
    if address.len() <= 8 {
        return address.to_string();
    }
    let start: String = address.chars().take(4).collect();
    let end: String = address.chars().skip(address.chars().count() - 4).collect();
    format!("{start}...{end}")
}

fn wallet_display(wallet: &Wallet) -> String {
    wallet.username.clone().unwrap_or_else(|| truncate_address(&wallet.address))
}

fn wallet_field(label: &str, wallet: &Wallet, profile_base_url: &str) -> EmbedField {
    EmbedField {
        name: label.to_string(),
        value: format!(
            "[{}]({}/{})",
            wallet_display(wallet),
            profile_base_url.trim_end_matches('/'),
            wallet.address
        ),
        inline: true,
    }
}

/// Formats one event into a webhook message.
///
/// Sales use the total price, listings the starting price. When the payment
/// token is the reference currency the price is scaled from smallest units
/// and a USD field is added from the token's exchange rate; other tokens
/// are displayed as reported by the feed.
pub fn build_notification(
    event: &MarketEvent,
    profile_base_url: &str,
    reference_symbol: &str,
    now: DateTime<Utc>,
) -> Notification {
    let sold = event.buyer.is_some();

    let mut fields = vec![wallet_field("Seller", &event.seller, profile_base_url)];
    if let Some(buyer) = &event.buyer {
        fields.push(wallet_field("Buyer", buyer, profile_base_url));
    }

    let raw_price = if sold { event.total_price.as_deref() } else { event.starting_price.as_deref() };
    let mut price = raw_price.and_then(|p| p.parse::<f64>().ok());

    if event.payment_token.symbol == reference_symbol {
        price = price.map(|p| p / SMALLEST_UNIT_SCALE);
        if let (Some(native), Ok(rate)) = (price, event.payment_token.usd_price.parse::<f64>()) {
            fields.push(EmbedField {
                name: "USD Price".to_string(),
                value: format!("${:.2}", native * rate),
                inline: true,
            });
        }
    }

    let asset_title = event
        .asset
        .name
        .clone()
        .unwrap_or_else(|| format!("{} #{}", event.collection, event.asset.token_id));
    let label = notification_label(event.kind);
    let title = match price {
        Some(price) => {
            format!("{asset_title} {label} for {price} {}", event.payment_token.symbol)
        },
        None => format!("{asset_title} {label}"),
    };

    Notification {
        content: None,
        embeds: vec![Embed {
            author: EmbedAuthor {
                name: event.collection.to_string(),
                icon_url: event.asset.collection.image_url.clone(),
            },
            title,
            url: event.asset.permalink.clone(),
            color: EMBED_COLOR,
            thumbnail: EmbedThumbnail { url: event.asset.thumbnail_url.clone() },
            fields,
            footer: EmbedFooter {
                text: format!("tidewatch || {}", now.format("%Y-%m-%dT%H:%M:%S")),
                icon_url: FOOTER_ICON.to_string(),
            },
        }],
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tidewatch_core::models::{
        AssetInfo, CollectionInfo, CollectionKey, EventId, PaymentToken,
    };

    use super::*;

    fn sale_event() -> MarketEvent {
        MarketEvent {
            id: EventId::from("evt-1"),
            collection: CollectionKey::from("0xabc123"),
            kind: EventKind::Successful,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            asset: AssetInfo {
                token_id: "42".to_string(),
                name: Some("Wave #42".to_string()),
                image_url: None,
                thumbnail_url: Some("https://img.example/42_thumb.png".to_string()),
                permalink: "https://market.example/assets/0xabc123/42".to_string(),
                collection: CollectionInfo { slug: Some("waves".to_string()), image_url: None },
            },
            seller: Wallet {
                address: "0x1234567890abcdef1234".to_string(),
                username: Some("alice".to_string()),
            },
            buyer: Some(Wallet {
                address: "0xfeedfacecafebeef9999".to_string(),
                username: None,
            }),
            starting_price: None,
            ending_price: None,
            total_price: Some("2500000000000000000".to_string()),
            payment_token: PaymentToken {
                symbol: "ETH".to_string(),
                name: "Ether".to_string(),
                eth_price: "1.0".to_string(),
                usd_price: "3000.00".to_string(),
            },
            is_private: false,
            auction_type: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_100, 0).unwrap()
    }

    #[test]
    fn converts_reference_currency_price_to_usd() {
        let notification = build_notification(&sale_event(), "https://market.example", "ETH", now());

        let usd = notification.embeds[0]
            .fields
            .iter()
            .find(|f| f.name == "USD Price")
            .expect("usd field present");
        assert_eq!(usd.value, "$7500.00");
    }

    #[test]
    fn scales_reference_currency_in_title() {
        let notification = build_notification(&sale_event(), "https://market.example", "ETH", now());
        assert_eq!(notification.embeds[0].title, "Wave #42 Sold for 2.5 ETH");
    }

    #[test]
    fn leaves_other_currencies_unscaled_without_usd_field() {
        let mut event = sale_event();
        event.payment_token.symbol = "DAI".to_string();

        let notification = build_notification(&event, "https://market.example", "ETH", now());
        assert!(notification.embeds[0].fields.iter().all(|f| f.name != "USD Price"));
        assert!(notification.embeds[0].title.contains("DAI"));
    }

    #[test]
    fn truncates_addresses() {
        assert_eq!(truncate_address("0x1234567890abcdef1234"), "0x12...1234");
        assert_eq!(truncate_address("0xab"), "0xab");
    }

    #[test]
    fn buyer_without_username_falls_back_to_truncated_address() {
        let notification = build_notification(&sale_event(), "https://market.example", "ETH", now());
        let buyer = notification.embeds[0]
            .fields
            .iter()
            .find(|f| f.name == "Buyer")
            .expect("buyer field present");
        assert!(buyer.value.starts_with("[0xfe...9999]"));
        assert!(buyer.value.contains("https://market.example/0xfeedfacecafebeef9999"));
    }

    #[test]
    fn unnamed_asset_uses_collection_and_token_id() {
        let mut event = sale_event();
        event.asset.name = None;

        let notification = build_notification(&event, "https://market.example", "ETH", now());
        assert!(notification.embeds[0].title.starts_with("0xabc123 #42 Sold"));
    }

    #[test]
    fn listing_uses_starting_price_and_listed_label() {
        let mut event = sale_event();
        event.kind = EventKind::Created;
        event.buyer = None;
        event.total_price = None;
        event.starting_price = Some("1000000000000000000".to_string());

        let notification = build_notification(&event, "https://market.example", "ETH", now());
        assert_eq!(notification.embeds[0].title, "Wave #42 Listed for 1 ETH");
        assert!(notification.embeds[0].fields.iter().all(|f| f.name != "Buyer"));
    }

    #[test]
    fn kind_labels() {
        assert_eq!(notification_label(EventKind::Created), "Listed");
        assert_eq!(notification_label(EventKind::Successful), "Sold");
    }
}
