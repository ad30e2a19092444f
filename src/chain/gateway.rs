use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::chain::network::NetworkProfile;
use crate::common::error::EscrowError;

/// Seam to the injected wallet/chain provider. Submitting returns the
/// transaction hash immediately; `await_confirmation` blocks the caller
/// until the transaction is accepted into chain state, or surfaces the
/// revert as `ChainCall`.
///
/// Implementations map wallet failures onto the crate taxonomy: no account
/// or a refused network switch is `ChainUnavailable`, a chain id the wallet
/// does not know is `UnrecognizedChain`, and a signature rejection or revert
/// is `ChainCall`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Requests the active wallet account.
    async fn connect_account(&self) -> Result<Address, EscrowError>;

    /// Hex chain id of the network the wallet is currently on.
    async fn chain_id(&self) -> Result<String, EscrowError>;

    async fn switch_chain(&self, chain_id: &str) -> Result<(), EscrowError>;

    async fn add_chain(&self, profile: &NetworkProfile) -> Result<(), EscrowError>;

    /// ERC-20 allowance `owner` has granted `spender` on `token`.
    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, EscrowError>;

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<B256, EscrowError>;

    async fn deposit(
        &self,
        escrow: Address,
        trade_id: B256,
        buyer: Address,
        amount: U256,
    ) -> Result<B256, EscrowError>;

    async fn confirm_fiat(&self, escrow: Address, trade_id: B256) -> Result<B256, EscrowError>;

    async fn release(&self, escrow: Address, trade_id: B256) -> Result<B256, EscrowError>;

    async fn refund(&self, escrow: Address, trade_id: B256) -> Result<B256, EscrowError>;

    async fn claim_by_buyer(&self, escrow: Address, trade_id: B256) -> Result<B256, EscrowError>;

    async fn await_confirmation(&self, tx_hash: B256) -> Result<(), EscrowError>;
}
