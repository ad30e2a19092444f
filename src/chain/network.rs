use alloy_primitives::{address, Address};

use crate::chain::gateway::ChainGateway;
use crate::common::error::EscrowError;

/// Polygon mainnet, the single fixed target network for every chain call.
pub const POLYGON_CHAIN_ID: &str = "0x89";

/// Native USDC on Polygon.
pub const USDC_ADDRESS: Address = address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359");

/// Deployed escrow contract, overridable by backend runtime configuration.
pub const DEFAULT_ESCROW_ADDRESS: Address = address!("C4aa00e5DFe7F88D6EE26917463e3CaeA29955e6");

/// Everything a wallet needs to register the target network when it does not
/// already know it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkProfile {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency_symbol: String,
    pub native_currency_decimals: u8,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl NetworkProfile {
    pub fn polygon() -> Self {
        NetworkProfile {
            chain_id: POLYGON_CHAIN_ID.to_string(),
            chain_name: "Polygon Mainnet".to_string(),
            native_currency_symbol: "MATIC".to_string(),
            native_currency_decimals: 18,
            rpc_urls: vec!["https://polygon-rpc.com".to_string()],
            block_explorer_urls: vec!["https://polygonscan.com/".to_string()],
        }
    }
}

/// Chain-side parameters for one sequencer run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainConfig {
    pub network: NetworkProfile,
    pub usdc_address: Address,
    pub escrow_address: Address,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            network: NetworkProfile::polygon(),
            usdc_address: USDC_ADDRESS,
            escrow_address: DEFAULT_ESCROW_ADDRESS,
        }
    }
}

/// Brings the wallet onto the target network before any call: switch if the
/// active chain differs, and if the wallet does not know the chain at all,
/// register it first and switch again.
pub async fn ensure_network(
    gateway: &dyn ChainGateway,
    profile: &NetworkProfile,
) -> Result<(), EscrowError> {
    let active = gateway.chain_id().await?;
    if active == profile.chain_id {
        return Ok(());
    }

    match gateway.switch_chain(&profile.chain_id).await {
        Ok(()) => Ok(()),
        Err(EscrowError::UnrecognizedChain(_)) => {
            gateway.add_chain(profile).await?;
            gateway.switch_chain(&profile.chain_id).await
        }
        Err(error) => Err(error),
    }
}
