use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::chain::{ChainGateway, NetworkProfile, POLYGON_CHAIN_ID};
use crate::common::error::EscrowError;

/// Hand-rolled wallet double for end-to-end style tests: records every call
/// by name, tracks the allowance an approval would grant, and can be told to
/// fail one specific call or to delay confirmations.
pub struct ScriptedGateway {
    account: Address,
    chain_id: Mutex<String>,
    known_chains: Mutex<Vec<String>>,
    allowance: Mutex<U256>,
    fail_on: Mutex<Option<String>>,
    confirmation_delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new(account: Address) -> Self {
        Self {
            account,
            chain_id: Mutex::new(POLYGON_CHAIN_ID.to_string()),
            known_chains: Mutex::new(vec![POLYGON_CHAIN_ID.to_string()]),
            allowance: Mutex::new(U256::ZERO),
            fail_on: Mutex::new(None),
            confirmation_delay: Duration::ZERO,
            calls: Mutex::new(vec![]),
        }
    }

    /// Starts the wallet on a foreign network so the switch leg runs.
    pub fn on_chain(mut self, chain_id: &str) -> Self {
        self.chain_id = Mutex::new(chain_id.to_string());
        self
    }

    pub fn with_allowance(self, allowance: U256) -> Self {
        *self.allowance.lock().unwrap() = allowance;
        self
    }

    /// Every `await_confirmation` takes this long. Combined with paused
    /// tokio time this keeps a sequence in flight for as long as the test
    /// needs it to be.
    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = delay;
        self
    }

    /// The named call fails once with a `ChainCall` error.
    pub fn fail_next(&self, call: &str) {
        *self.fail_on.lock().unwrap() = Some(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) -> Result<(), EscrowError> {
        self.calls.lock().unwrap().push(call.to_string());
        let mut fail_on = self.fail_on.lock().unwrap();
        if fail_on.as_deref() == Some(call) {
            *fail_on = None;
            return Err(EscrowError::ChainCall(format!("scripted {} failure", call)));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainGateway for ScriptedGateway {
    async fn connect_account(&self) -> Result<Address, EscrowError> {
        self.record("connect_account")?;
        Ok(self.account)
    }

    async fn chain_id(&self) -> Result<String, EscrowError> {
        self.record("chain_id")?;
        Ok(self.chain_id.lock().unwrap().clone())
    }

    async fn switch_chain(&self, chain_id: &str) -> Result<(), EscrowError> {
        self.record("switch_chain")?;
        if !self
            .known_chains
            .lock()
            .unwrap()
            .iter()
            .any(|known| known == chain_id)
        {
            return Err(EscrowError::UnrecognizedChain(chain_id.to_string()));
        }
        *self.chain_id.lock().unwrap() = chain_id.to_string();
        Ok(())
    }

    async fn add_chain(&self, profile: &NetworkProfile) -> Result<(), EscrowError> {
        self.record("add_chain")?;
        self.known_chains
            .lock()
            .unwrap()
            .push(profile.chain_id.clone());
        Ok(())
    }

    async fn allowance(
        &self,
        _token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<U256, EscrowError> {
        self.record("allowance")?;
        Ok(*self.allowance.lock().unwrap())
    }

    async fn approve(
        &self,
        _token: Address,
        _spender: Address,
        amount: U256,
    ) -> Result<B256, EscrowError> {
        self.record("approve")?;
        *self.allowance.lock().unwrap() = amount;
        Ok(B256::with_last_byte(1))
    }

    async fn deposit(
        &self,
        _escrow: Address,
        _trade_id: B256,
        _buyer: Address,
        _amount: U256,
    ) -> Result<B256, EscrowError> {
        self.record("deposit")?;
        Ok(B256::with_last_byte(2))
    }

    async fn confirm_fiat(&self, _escrow: Address, _trade_id: B256) -> Result<B256, EscrowError> {
        self.record("confirm_fiat")?;
        Ok(B256::with_last_byte(3))
    }

    async fn release(&self, _escrow: Address, _trade_id: B256) -> Result<B256, EscrowError> {
        self.record("release")?;
        Ok(B256::with_last_byte(4))
    }

    async fn refund(&self, _escrow: Address, _trade_id: B256) -> Result<B256, EscrowError> {
        self.record("refund")?;
        Ok(B256::with_last_byte(5))
    }

    async fn claim_by_buyer(&self, _escrow: Address, _trade_id: B256) -> Result<B256, EscrowError> {
        self.record("claim_by_buyer")?;
        Ok(B256::with_last_byte(6))
    }

    async fn await_confirmation(&self, _tx_hash: B256) -> Result<(), EscrowError> {
        self.record("await_confirmation")?;
        if !self.confirmation_delay.is_zero() {
            tokio::time::sleep(self.confirmation_delay).await;
        }
        Ok(())
    }
}
