use std::sync::Arc;

use alloy_primitives::B256;
use strum_macros::{Display, IntoStaticStr};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::chain::{ensure_network, ChainConfig, ChainGateway};
use crate::common::error::EscrowError;
use crate::policy::TradeAction;
use crate::trade::TradeRecord;

/// Progress milestones surfaced to the user while a sequence runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, IntoStaticStr)]
pub enum SequencerStep {
    EnsureNetwork,
    CheckAllowance,
    Approve,
    AwaitApproval,
    SubmitDeposit,
    AwaitDeposit,
    SubmitCall,
    AwaitCall,
}

pub(crate) enum SequencerEvent {
    Step {
        action: TradeAction,
        step: SequencerStep,
    },
    Done {
        action: TradeAction,
        result: Result<(), EscrowError>,
    },
}

/// Internal state machine for the deposit sequence. The transitions are the
/// only way forward, so a deposit can never be submitted ahead of a pending
/// approval confirmation.
enum DepositStep {
    CheckAllowance,
    Approve,
    AwaitApproval(B256),
    SubmitDeposit,
    AwaitDeposit(B256),
    Confirmed,
}

/// Executes one named escrow operation as an ordered sequence of chain
/// calls, each awaited to confirmation. Any failure aborts at the current
/// step and leaves the trade record untouched - the backend and chain
/// remain the source of truth.
pub(crate) struct TxSequencer {
    gateway: Arc<dyn ChainGateway>,
    config: ChainConfig,
    event_tx: mpsc::Sender<SequencerEvent>,
}

impl TxSequencer {
    pub(crate) fn new(
        gateway: Arc<dyn ChainGateway>,
        config: ChainConfig,
        event_tx: mpsc::Sender<SequencerEvent>,
    ) -> Self {
        Self {
            gateway,
            config,
            event_tx,
        }
    }

    /// Runs the operation to completion on its own task, reporting the
    /// terminal outcome through the event channel.
    pub(crate) fn spawn(self, action: TradeAction, trade: TradeRecord) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let result = self.run(action, &trade).await;
            let _ = self
                .event_tx
                .send(SequencerEvent::Done { action, result })
                .await;
        })
    }

    async fn run(&self, action: TradeAction, trade: &TradeRecord) -> Result<(), EscrowError> {
        debug!("Sequencer for trade {} running {}", trade.id, action);

        self.emit(action, SequencerStep::EnsureNetwork).await;
        ensure_network(self.gateway.as_ref(), &self.config.network).await?;
        let account = self.gateway.connect_account().await?;

        match action {
            TradeAction::DepositToEscrow => self.deposit(account, trade).await?,
            TradeAction::ConfirmFiatSent
            | TradeAction::Release
            | TradeAction::Refund
            | TradeAction::ClaimByTimeout => self.single_call(action, trade).await?,
        }

        info!("Sequencer for trade {} finished {}", trade.id, action);
        Ok(())
    }

    /// check-allowance -> approve? -> await -> deposit -> await. The
    /// approval leg is skipped entirely when the standing allowance already
    /// covers the scaled amount.
    async fn deposit(
        &self,
        owner: alloy_primitives::Address,
        trade: &TradeRecord,
    ) -> Result<(), EscrowError> {
        let action = TradeAction::DepositToEscrow;
        let amount = trade.usdc_token_units();
        let escrow = self.config.escrow_address;
        let buyer = trade.buyer_wallet.ok_or_else(|| {
            EscrowError::Validation(format!("Trade {} has no buyer wallet yet", trade.id))
        })?;

        let mut step = DepositStep::CheckAllowance;
        loop {
            step = match step {
                DepositStep::CheckAllowance => {
                    self.emit(action, SequencerStep::CheckAllowance).await;
                    let allowance = self
                        .gateway
                        .allowance(self.config.usdc_address, owner, escrow)
                        .await?;
                    if allowance < amount {
                        DepositStep::Approve
                    } else {
                        debug!(
                            "Trade {} allowance {} already covers {}, skipping approval",
                            trade.id, allowance, amount
                        );
                        DepositStep::SubmitDeposit
                    }
                }
                DepositStep::Approve => {
                    self.emit(action, SequencerStep::Approve).await;
                    let tx_hash = self
                        .gateway
                        .approve(self.config.usdc_address, escrow, amount)
                        .await?;
                    DepositStep::AwaitApproval(tx_hash)
                }
                DepositStep::AwaitApproval(tx_hash) => {
                    self.emit(action, SequencerStep::AwaitApproval).await;
                    self.gateway.await_confirmation(tx_hash).await?;
                    DepositStep::SubmitDeposit
                }
                DepositStep::SubmitDeposit => {
                    self.emit(action, SequencerStep::SubmitDeposit).await;
                    let tx_hash = self
                        .gateway
                        .deposit(escrow, trade.chain_trade_id(), buyer, amount)
                        .await?;
                    DepositStep::AwaitDeposit(tx_hash)
                }
                DepositStep::AwaitDeposit(tx_hash) => {
                    self.emit(action, SequencerStep::AwaitDeposit).await;
                    self.gateway.await_confirmation(tx_hash).await?;
                    DepositStep::Confirmed
                }
                DepositStep::Confirmed => return Ok(()),
            };
        }
    }

    /// The four single-call operations: submit keyed by the chain-encoded
    /// trade id, then wait for confirmation.
    async fn single_call(
        &self,
        action: TradeAction,
        trade: &TradeRecord,
    ) -> Result<(), EscrowError> {
        let escrow = self.config.escrow_address;
        let trade_id = trade.chain_trade_id();

        self.emit(action, SequencerStep::SubmitCall).await;
        let tx_hash = match action {
            TradeAction::ConfirmFiatSent => self.gateway.confirm_fiat(escrow, trade_id).await?,
            TradeAction::Release => self.gateway.release(escrow, trade_id).await?,
            TradeAction::Refund => self.gateway.refund(escrow, trade_id).await?,
            TradeAction::ClaimByTimeout => self.gateway.claim_by_buyer(escrow, trade_id).await?,
            TradeAction::DepositToEscrow => {
                unreachable!("deposit runs its own step machine")
            }
        };

        self.emit(action, SequencerStep::AwaitCall).await;
        self.gateway.await_confirmation(tx_hash).await?;
        Ok(())
    }

    async fn emit(&self, action: TradeAction, step: SequencerStep) {
        let _ = self
            .event_tx
            .send(SequencerEvent::Step { action, step })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MockChainGateway, NetworkProfile, POLYGON_CHAIN_ID};
    use crate::testing::SomeTestParams;
    use crate::trade::TradeStatus;
    use alloy_primitives::{Address, B256, U256};
    use mockall::Sequence;

    fn on_target_network(gateway: &mut MockChainGateway) {
        gateway
            .expect_chain_id()
            .returning(|| Ok(POLYGON_CHAIN_ID.to_string()));
        gateway
            .expect_connect_account()
            .returning(|| Ok(SomeTestParams::seller_address()));
    }

    async fn run_sequencer(
        gateway: MockChainGateway,
        action: TradeAction,
        trade: TradeRecord,
    ) -> Result<(), EscrowError> {
        let (event_tx, mut event_rx) = mpsc::channel(64);
        let sequencer = TxSequencer::new(Arc::new(gateway), ChainConfig::default(), event_tx);
        sequencer.spawn(action, trade);

        loop {
            match event_rx.recv().await {
                Some(SequencerEvent::Done { result, .. }) => return result,
                Some(SequencerEvent::Step { .. }) => continue,
                None => panic!("sequencer channel closed without Done"),
            }
        }
    }

    #[tokio::test]
    async fn insufficient_allowance_approves_before_depositing() {
        let mut gateway = MockChainGateway::new();
        on_target_network(&mut gateway);

        let approve_tx = B256::with_last_byte(1);
        let deposit_tx = B256::with_last_byte(2);

        let mut seq = Sequence::new();
        gateway
            .expect_allowance()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(U256::ZERO));
        gateway
            .expect_approve()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, _, amount| *amount == U256::from(100_000_000u64))
            .returning(move |_, _, _| Ok(approve_tx));
        gateway
            .expect_await_confirmation()
            .times(1)
            .in_sequence(&mut seq)
            .withf(move |tx| *tx == approve_tx)
            .returning(|_| Ok(()));
        gateway
            .expect_deposit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _, _, _| Ok(deposit_tx));
        gateway
            .expect_await_confirmation()
            .times(1)
            .in_sequence(&mut seq)
            .withf(move |tx| *tx == deposit_tx)
            .returning(|_| Ok(()));

        let trade = SomeTestParams::record_at(TradeStatus::Joined);
        run_sequencer(gateway, TradeAction::DepositToEscrow, trade)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sufficient_allowance_skips_approval() {
        let mut gateway = MockChainGateway::new();
        on_target_network(&mut gateway);

        gateway
            .expect_allowance()
            .returning(|_, _, _| Ok(U256::from(100_000_000u64)));
        gateway.expect_approve().times(0);
        gateway
            .expect_deposit()
            .times(1)
            .returning(|_, _, _, _| Ok(B256::with_last_byte(2)));
        gateway
            .expect_await_confirmation()
            .times(1)
            .returning(|_| Ok(()));

        let trade = SomeTestParams::record_at(TradeStatus::Joined);
        run_sequencer(gateway, TradeAction::DepositToEscrow, trade)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deposit_carries_trade_id_buyer_and_scaled_amount() {
        let mut gateway = MockChainGateway::new();
        on_target_network(&mut gateway);

        let trade = SomeTestParams::record_at(TradeStatus::Joined);
        let expected_id = trade.chain_trade_id();
        let expected_buyer = trade.buyer_wallet.unwrap();

        gateway
            .expect_allowance()
            .returning(|_, _, _| Ok(U256::MAX));
        gateway
            .expect_deposit()
            .withf(move |_, trade_id, buyer, amount| {
                *trade_id == expected_id
                    && *buyer == expected_buyer
                    && *amount == U256::from(100_000_000u64)
            })
            .returning(|_, _, _, _| Ok(B256::with_last_byte(2)));
        gateway
            .expect_await_confirmation()
            .returning(|_| Ok(()));

        run_sequencer(gateway, TradeAction::DepositToEscrow, trade)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn approval_revert_aborts_before_deposit() {
        let mut gateway = MockChainGateway::new();
        on_target_network(&mut gateway);

        gateway
            .expect_allowance()
            .returning(|_, _, _| Ok(U256::ZERO));
        gateway
            .expect_approve()
            .returning(|_, _, _| Ok(B256::with_last_byte(1)));
        gateway
            .expect_await_confirmation()
            .returning(|_| Err(EscrowError::ChainCall("execution reverted".to_string())));
        gateway.expect_deposit().times(0);

        let trade = SomeTestParams::record_at(TradeStatus::Joined);
        let result = run_sequencer(gateway, TradeAction::DepositToEscrow, trade).await;
        assert!(matches!(result, Err(EscrowError::ChainCall(_))));
    }

    #[tokio::test]
    async fn deposit_without_buyer_wallet_is_refused() {
        let mut gateway = MockChainGateway::new();
        on_target_network(&mut gateway);
        gateway.expect_allowance().times(0);

        let mut trade = SomeTestParams::record_at(TradeStatus::Joined);
        trade.buyer_wallet = None;
        let result = run_sequencer(gateway, TradeAction::DepositToEscrow, trade).await;
        assert!(matches!(result, Err(EscrowError::Validation(_))));
    }

    #[tokio::test]
    async fn release_is_submit_then_await() {
        let mut gateway = MockChainGateway::new();
        on_target_network(&mut gateway);

        let release_tx = B256::with_last_byte(7);
        let mut seq = Sequence::new();
        gateway
            .expect_release()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _| Ok(release_tx));
        gateway
            .expect_await_confirmation()
            .times(1)
            .in_sequence(&mut seq)
            .withf(move |tx| *tx == release_tx)
            .returning(|_| Ok(()));

        let trade = SomeTestParams::record_at(TradeStatus::FiatSent);
        run_sequencer(gateway, TradeAction::Release, trade)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wrong_network_gets_switched_before_any_escrow_call() {
        let mut gateway = MockChainGateway::new();
        let mut seq = Sequence::new();
        gateway
            .expect_chain_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok("0x1".to_string()));
        gateway
            .expect_switch_chain()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        gateway
            .expect_connect_account()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Address::ZERO));
        gateway
            .expect_refund()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(B256::with_last_byte(9)));
        gateway
            .expect_await_confirmation()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let trade = SomeTestParams::record_at(TradeStatus::UsdcEscrowed);
        run_sequencer(gateway, TradeAction::Refund, trade)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn signature_rejection_surfaces_as_chain_call_failure() {
        let mut gateway = MockChainGateway::new();
        on_target_network(&mut gateway);
        gateway.expect_confirm_fiat().returning(|_, _| {
            Err(EscrowError::ChainCall(
                "User rejected the signature request".to_string(),
            ))
        });
        gateway.expect_await_confirmation().times(0);

        let trade = SomeTestParams::record_at(TradeStatus::UsdcEscrowed);
        let result = run_sequencer(gateway, TradeAction::ConfirmFiatSent, trade).await;
        assert!(matches!(result, Err(EscrowError::ChainCall(_))));
    }

    #[tokio::test]
    async fn step_events_precede_the_terminal_outcome() {
        let mut gateway = MockChainGateway::new();
        on_target_network(&mut gateway);
        gateway
            .expect_allowance()
            .returning(|_, _, _| Ok(U256::MAX));
        gateway
            .expect_deposit()
            .returning(|_, _, _, _| Ok(B256::with_last_byte(2)));
        gateway
            .expect_await_confirmation()
            .returning(|_| Ok(()));

        let (event_tx, mut event_rx) = mpsc::channel(64);
        let sequencer =
            TxSequencer::new(Arc::new(gateway), ChainConfig::default(), event_tx);
        sequencer.spawn(
            TradeAction::DepositToEscrow,
            SomeTestParams::record_at(TradeStatus::Joined),
        );

        let mut steps = vec![];
        loop {
            match event_rx.recv().await.unwrap() {
                SequencerEvent::Step { step, .. } => steps.push(step),
                SequencerEvent::Done { result, .. } => {
                    result.unwrap();
                    break;
                }
            }
        }
        assert_eq!(
            steps,
            vec![
                SequencerStep::EnsureNetwork,
                SequencerStep::CheckAllowance,
                SequencerStep::SubmitDeposit,
                SequencerStep::AwaitDeposit,
            ]
        );
    }
}
