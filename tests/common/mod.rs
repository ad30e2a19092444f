use tokio::sync::mpsc;

use usdc_krw_escrow::policy::ActionSpec;
use usdc_krw_escrow::testing::SomeTestParams;
use usdc_krw_escrow::trade::{TradeRecord, TradeStatus};
use usdc_krw_escrow::trader::TraderNotif;

/// Deterministic record at a lifecycle point, without a deadline so that
/// countdown ticks do not interleave with the notifications under test.
pub fn record(status: TradeStatus) -> TradeRecord {
    let mut record = SomeTestParams::record_at(status);
    record.expires_at = None;
    record
}

/// The push envelope the backend broadcasts for a record.
pub fn push_payload(trade: &TradeRecord) -> String {
    format!(
        "{{\"type\":\"trade_update\",\"trade\":{}}}",
        serde_json::to_string(trade).unwrap()
    )
}

/// Next `Updated` notification, skipping progress and countdown noise.
pub async fn next_updated(
    notif_rx: &mut mpsc::Receiver<TraderNotif>,
) -> (TradeRecord, Vec<ActionSpec>) {
    loop {
        match notif_rx.recv().await.expect("notif channel closed") {
            TraderNotif::Updated { trade, actions } => return (trade, actions),
            _ => continue,
        }
    }
}

/// Terminal outcome of the running sequence.
pub async fn next_outcome(notif_rx: &mut mpsc::Receiver<TraderNotif>) -> TraderNotif {
    loop {
        match notif_rx.recv().await.expect("notif channel closed") {
            notif @ (TraderNotif::ActionSubmitted { .. } | TraderNotif::ActionFailed { .. }) => {
                return notif
            }
            _ => continue,
        }
    }
}
