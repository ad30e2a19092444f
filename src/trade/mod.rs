mod builder;
mod record;

pub use builder::{CreateTradeBuilder, CreateTradeRequest};
pub use record::{Role, TradeRecord, TradeStatus, USDC_DECIMALS};
