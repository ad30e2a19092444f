use std::sync::Arc;

use url::Url;

use crate::backend::BackendClient;
use crate::chain::{ChainConfig, ChainGateway};
use crate::sync::PushTransport;
use crate::trade::{Role, TradeRecord};
use crate::trader::{Trader, TraderAccess};

/// Spawns a trade view wired to test doubles, with no live backend behind
/// it. Catch-up fetches go to an unroutable port and fail silently, so the
/// supplied transport is the only source of record updates.
pub fn spawn_trader(
    trade: TradeRecord,
    role: Role,
    gateway: Arc<dyn ChainGateway>,
    transport: Arc<dyn PushTransport>,
) -> TraderAccess {
    let backend = BackendClient::new(Url::parse("http://127.0.0.1:1").unwrap());
    let ws_url = backend.ws_url(trade.id).unwrap();
    let trader = Trader::new(
        trade,
        role,
        backend,
        gateway,
        ChainConfig::default(),
        transport,
        ws_url,
    );
    trader.new_accessor()
}
