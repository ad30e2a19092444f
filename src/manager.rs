use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    backend::BackendClient,
    chain::{ChainConfig, ChainGateway},
    common::{error::EscrowError, persist::RoleStore},
    sync::{PushTransport, WsTransport},
    trade::{CreateTradeRequest, Role, TradeRecord},
    trader::{Trader, TraderAccess},
};

/// Top-level entry point. Owns the backend client, the chain configuration,
/// the durable role assignments, and at most one live trade view at a time.
pub struct Manager {
    backend: BackendClient,
    gateway: Arc<dyn ChainGateway>,
    transport: Arc<dyn PushTransport>,
    chain_config: ChainConfig,
    role_store: RoleStore,
    active: Mutex<Option<ActiveTrade>>,
}

struct ActiveTrade {
    trade_id: Uuid,
    trader: Trader,
}

impl Manager {
    /// Connects against the given backend over WebSocket push, loading role
    /// assignments from `data_dir`.
    pub async fn new(
        base_url: Url,
        gateway: Arc<dyn ChainGateway>,
        data_dir: impl AsRef<Path>,
    ) -> Result<Manager, EscrowError> {
        Self::new_with_transport(base_url, gateway, Arc::new(WsTransport), data_dir).await
    }

    pub async fn new_with_transport(
        base_url: Url,
        gateway: Arc<dyn ChainGateway>,
        transport: Arc<dyn PushTransport>,
        data_dir: impl AsRef<Path>,
    ) -> Result<Manager, EscrowError> {
        let backend = BackendClient::new(base_url);
        let role_store = RoleStore::open(data_dir)?;

        // The escrow address is deployment-specific; anything the backend
        // does not override keeps the built-in default
        let mut chain_config = ChainConfig::default();
        match backend.get_runtime_config().await {
            Ok(config) => {
                if let Some(escrow_address) = config.escrow_contract_address {
                    chain_config.escrow_address = escrow_address;
                }
            }
            Err(error) => {
                warn!(
                    "Could not fetch runtime config, keeping default escrow address - {}",
                    error
                );
            }
        }
        info!(
            "Manager starting against escrow contract {}",
            chain_config.escrow_address
        );

        Ok(Manager {
            backend,
            gateway,
            transport,
            chain_config,
            role_store,
            active: Mutex::new(None),
        })
    }

    pub fn chain_config(&self) -> &ChainConfig {
        &self.chain_config
    }

    /// Creates a new trade as the seller and opens its view. The role
    /// assignment is persisted before the view comes up.
    pub async fn create_trade(
        &self,
        request: &CreateTradeRequest,
    ) -> Result<TraderAccess, EscrowError> {
        let record = self.backend.create_trade(request).await?;
        let role = self.role_store.assign(record.id, Role::Seller);
        info!("Created trade {} as {}", record.id, role);
        self.open_view(record, role).await
    }

    /// Opens the view for an existing trade. The stored role wins when one
    /// exists; a first visit to someone else's trade assigns `Buyer`.
    /// Re-entering the already-open trade returns the existing view, so the
    /// push subscription is not disturbed.
    pub async fn enter_trade(&self, trade_id: Uuid) -> Result<TraderAccess, EscrowError> {
        {
            let active = self.active.lock().await;
            if let Some(active) = active.as_ref() {
                if active.trade_id == trade_id {
                    return Ok(active.trader.new_accessor());
                }
            }
        }

        let record = self.backend.get_trade(trade_id).await?;
        let role = match self.role_store.role(trade_id) {
            Some(role) => role,
            None => self.role_store.assign(trade_id, Role::Buyer),
        };
        info!("Entering trade {} as {}", trade_id, role);
        self.open_view(record, role).await
    }

    async fn open_view(
        &self,
        record: TradeRecord,
        role: Role,
    ) -> Result<TraderAccess, EscrowError> {
        let ws_url = self.backend.ws_url(record.id)?;

        // The slot stays locked across the swap, so the previous view and
        // its push subscription are fully gone before the next one comes up
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            Self::teardown(previous).await;
        }

        let trader = Trader::new(
            record.clone(),
            role,
            self.backend.clone(),
            self.gateway.clone(),
            self.chain_config.clone(),
            self.transport.clone(),
            ws_url,
        );
        let access = trader.new_accessor();
        *active = Some(ActiveTrade {
            trade_id: record.id,
            trader,
        });
        Ok(access)
    }

    /// Closes the current trade view, tearing down its push subscription
    /// and countdown. The trade itself lives on at the backend.
    pub async fn leave_trade(&self) {
        if let Some(active) = self.active.lock().await.take() {
            Self::teardown(active).await;
        }
    }

    async fn teardown(active: ActiveTrade) {
        let access = active.trader.new_accessor();
        if let Err(error) = access.shutdown().await {
            warn!(
                "Error shutting down trader for trade {} - {}",
                active.trade_id, error
            );
        }
        let _ = active.trader.task_handle.await;
    }

    pub async fn shutdown(self) {
        self.leave_trade().await;
        self.role_store.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MockChainGateway, DEFAULT_ESCROW_ADDRESS};
    use crate::testing::{ScriptedTransport, SomeTestParams};
    use crate::trade::TradeStatus;

    fn temp_data_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("escrow-manager-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    async fn unreachable_manager(dir: &std::path::Path) -> Manager {
        Manager::new_with_transport(
            Url::parse("http://127.0.0.1:1").unwrap(),
            Arc::new(MockChainGateway::new()),
            Arc::new(ScriptedTransport::new(vec![])),
            dir,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn unreachable_backend_keeps_default_escrow_address() {
        let dir = temp_data_dir();
        let manager = unreachable_manager(&dir).await;
        assert_eq!(manager.chain_config().escrow_address, DEFAULT_ESCROW_ADDRESS);
        manager.shutdown().await;
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn switching_trades_tears_down_the_previous_view() {
        let dir = temp_data_dir();
        let manager = unreachable_manager(&dir).await;

        let first = SomeTestParams::record_at(TradeStatus::Joined);
        let first_access = manager.open_view(first.clone(), Role::Seller).await.unwrap();
        assert_eq!(first_access.trade().await.id, first.id);

        let mut second = SomeTestParams::record_at(TradeStatus::Joined);
        second.id = Uuid::new_v4();
        let second_access = manager.open_view(second.clone(), Role::Buyer).await.unwrap();

        // Only the new view is live; the old actor is gone, not just replaced
        assert!(first_access.shutdown().await.is_err());
        assert_eq!(second_access.trade().await.id, second.id);

        manager.shutdown().await;
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn entering_a_trade_with_no_backend_surfaces_network_error() {
        let dir = temp_data_dir();
        let manager = unreachable_manager(&dir).await;
        let result = manager.enter_trade(Uuid::new_v4()).await;
        assert!(matches!(result, Err(EscrowError::NetworkUnavailable(_))));
        manager.shutdown().await;
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
