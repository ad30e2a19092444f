mod gateway;
mod network;

pub use gateway::ChainGateway;
pub use network::{
    ensure_network, ChainConfig, NetworkProfile, DEFAULT_ESCROW_ADDRESS, POLYGON_CHAIN_ID,
    USDC_ADDRESS,
};

#[cfg(test)]
pub(crate) use gateway::MockChainGateway;
