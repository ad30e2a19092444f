use alloy_primitives::{address, Address};
use chrono::{DateTime, Utc};
use url::Url;
use uuid::{uuid, Uuid};

use crate::trade::{TradeRecord, TradeStatus};

pub struct SomeTestParams {}

impl SomeTestParams {
    pub fn trade_id() -> Uuid {
        uuid!("f7457e16-3b5e-4b51-bf77-0917a25d4b51")
    }

    pub fn ws_url() -> Url {
        Url::parse(&format!("ws://localhost:8000/ws/{}", Self::trade_id())).unwrap()
    }

    pub fn seller_address() -> Address {
        address!("1111111111111111111111111111111111111111")
    }

    pub fn buyer_address() -> Address {
        address!("2222222222222222222222222222222222222222")
    }

    pub fn expires_at() -> DateTime<Utc> {
        "2026-08-29T12:00:00Z".parse().unwrap()
    }

    /// A deterministic record at the given point in the lifecycle, with the
    /// fields a backend would have filled in by then. Amount is 100 USDC so
    /// the scaled token amount is exactly 100_000_000.
    pub fn record_at(status: TradeStatus) -> TradeRecord {
        let joined = !matches!(status, TradeStatus::Created);
        let escrowed = matches!(
            status,
            TradeStatus::UsdcEscrowed
                | TradeStatus::FiatSent
                | TradeStatus::Completed
                | TradeStatus::Refunded
        );
        let completed = matches!(status, TradeStatus::Completed);
        let terminal = status.is_terminal();

        TradeRecord {
            id: Self::trade_id(),
            status,
            seller_wallet: Self::seller_address(),
            buyer_wallet: joined.then(Self::buyer_address),
            usdc_amount: 100.0,
            total_krw: 135000.0,
            bank_name: Some("KB Kookmin".to_string()),
            bank_account: Some("123-456-789012".to_string()),
            escrow_tx_hash: escrowed.then(|| "0xe5c401".to_string()),
            release_tx_hash: completed.then(|| "0x4e1ea5e".to_string()),
            expires_at: (!terminal).then(Self::expires_at),
        }
    }
}
