use std::str::FromStr;

use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

pub const USDC_DECIMALS: u32 = 6;

/// The fixed perspective a client holds on a given trade, assigned once at
/// first contact and persisted keyed by trade identifier.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Seller,
    Buyer,
}

/// Closed lifecycle status set. Anything outside it deserializes into
/// `Unknown` carrying the raw tag, so an unmapped value is a distinct,
/// handled case rather than a silent default or a parse failure.
#[derive(Clone, Debug, PartialEq, Eq, Hash, EnumString, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TradeStatus {
    Created,
    Joined,
    UsdcEscrowed,
    FiatSent,
    Completed,
    Refunded,
    Expired,
    Cancelled,
    #[strum(default)]
    Unknown(String),
}

impl TradeStatus {
    /// Position along the forward lifecycle path. Terminal side branches and
    /// unknown tags carry no rank.
    pub fn rank(&self) -> Option<u8> {
        match self {
            TradeStatus::Created => Some(0),
            TradeStatus::Joined => Some(1),
            TradeStatus::UsdcEscrowed => Some(2),
            TradeStatus::FiatSent => Some(3),
            TradeStatus::Completed => Some(4),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeStatus::Completed
                | TradeStatus::Refunded
                | TradeStatus::Expired
                | TradeStatus::Cancelled
        )
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TradeStatus::Unknown(_))
    }
}

impl Serialize for TradeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TradeStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // Infallible - the strum default variant absorbs unmatched tags
        Ok(TradeStatus::from_str(&raw).unwrap_or(TradeStatus::Unknown(raw)))
    }
}

/// Server-authoritative snapshot of one trade. The client only ever caches
/// and reacts to these; it never locally mutates `status`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub status: TradeStatus,
    pub seller_wallet: Address,
    #[serde(default)]
    pub buyer_wallet: Option<Address>,
    pub usdc_amount: f64,
    pub total_krw: f64,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub bank_account: Option<String>,
    #[serde(default)]
    pub escrow_tx_hash: Option<String>,
    #[serde(default)]
    pub release_tx_hash: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TradeRecord {
    /// Chain-encoded trade identifier: the UUID's 16 raw bytes occupy the
    /// leading bytes of the 32-byte word, zero-filled to the right. Lossless
    /// and fixed-width.
    pub fn chain_trade_id(&self) -> B256 {
        let mut word = [0u8; 32];
        word[..16].copy_from_slice(self.id.as_bytes());
        B256::from(word)
    }

    /// `usdc_amount` scaled to the token's smallest unit (10^6).
    pub fn usdc_token_units(&self) -> U256 {
        let units = (self.usdc_amount * 10f64.powi(USDC_DECIMALS as i32)).round() as u128;
        U256::from(units)
    }

    /// Fiat settlement instructions are shown to the buyer only once escrow
    /// funding is confirmed.
    pub fn bank_details_visible(&self, role: Role) -> bool {
        role == Role::Buyer
            && self.bank_name.is_some()
            && matches!(
                self.status,
                TradeStatus::UsdcEscrowed | TradeStatus::FiatSent
            )
    }

    /// Elapsed deadline makes the trade presentable as expired even before
    /// the backend confirms it.
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_status(status: TradeStatus) -> TradeRecord {
        TradeRecord {
            id: Uuid::from_str("0188a3e2-5a1b-7c3d-9e4f-0123456789ab").unwrap(),
            status,
            seller_wallet: Address::ZERO,
            buyer_wallet: None,
            usdc_amount: 100.0,
            total_krw: 135000.0,
            bank_name: Some("KB".to_string()),
            bank_account: Some("123-456".to_string()),
            escrow_tx_hash: None,
            release_tx_hash: None,
            expires_at: None,
        }
    }

    #[test]
    fn chain_trade_id_is_left_aligned_and_lossless() {
        let record = record_with_status(TradeStatus::Created);
        let word = record.chain_trade_id();
        assert_eq!(&word[..16], record.id.as_bytes());
        assert!(word[16..].iter().all(|b| *b == 0));
        assert_eq!(Uuid::from_slice(&word[..16]).unwrap(), record.id);
    }

    #[test]
    fn usdc_scaling_uses_six_decimals() {
        let mut record = record_with_status(TradeStatus::Created);
        assert_eq!(record.usdc_token_units(), U256::from(100_000_000u64));
        record.usdc_amount = 0.5;
        assert_eq!(record.usdc_token_units(), U256::from(500_000u64));
        record.usdc_amount = 12.345678;
        assert_eq!(record.usdc_token_units(), U256::from(12_345_678u64));
    }

    #[test]
    fn status_round_trips_through_wire_tags() {
        for (status, tag) in [
            (TradeStatus::Created, "created"),
            (TradeStatus::UsdcEscrowed, "usdc_escrowed"),
            (TradeStatus::FiatSent, "fiat_sent"),
            (TradeStatus::Cancelled, "cancelled"),
        ] {
            assert_eq!(status.to_string(), tag);
            assert_eq!(
                serde_json::from_str::<TradeStatus>(&format!("\"{}\"", tag)).unwrap(),
                status
            );
        }
    }

    #[test]
    fn unexpected_status_tag_becomes_unknown() {
        let status: TradeStatus = serde_json::from_str("\"arbitrating\"").unwrap();
        assert_eq!(status, TradeStatus::Unknown("arbitrating".to_string()));
        assert!(status.is_unknown());
        assert_eq!(status.rank(), None);
    }

    #[test]
    fn bank_details_are_buyer_only_and_step_gated() {
        let record = record_with_status(TradeStatus::UsdcEscrowed);
        assert!(record.bank_details_visible(Role::Buyer));
        assert!(!record.bank_details_visible(Role::Seller));

        let record = record_with_status(TradeStatus::Joined);
        assert!(!record.bank_details_visible(Role::Buyer));

        let record = record_with_status(TradeStatus::FiatSent);
        assert!(record.bank_details_visible(Role::Buyer));
    }

    #[test]
    fn deadline_at_exactly_now_counts_as_expired() {
        let now = Utc::now();
        let mut record = record_with_status(TradeStatus::Joined);
        record.expires_at = Some(now);
        assert!(record.has_expired(now));
        record.expires_at = Some(now + chrono::Duration::seconds(1));
        assert!(!record.has_expired(now));
        record.expires_at = None;
        assert!(!record.has_expired(now));
    }

    #[test]
    fn terminal_statuses_have_no_rank_except_completed() {
        assert_eq!(TradeStatus::Completed.rank(), Some(4));
        assert!(TradeStatus::Completed.is_terminal());
        for status in [
            TradeStatus::Refunded,
            TradeStatus::Expired,
            TradeStatus::Cancelled,
        ] {
            assert!(status.is_terminal());
            assert_eq!(status.rank(), None);
        }
        assert!(!TradeStatus::FiatSent.is_terminal());
    }
}
