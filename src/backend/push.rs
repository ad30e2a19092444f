use serde::Deserialize;

use crate::trade::TradeRecord;

/// Tagged envelope delivered over the push channel. Unrecognized `type`
/// values deserialize into `Unknown` and are dropped by the sync channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEnvelope {
    TradeUpdate { trade: TradeRecord },
    #[serde(other)]
    Unknown,
}
