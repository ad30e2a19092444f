use std::sync::Arc;

use alloy_primitives::Address;
use strum_macros::{Display, IntoStaticStr};
use tokio::{
    select,
    sync::{mpsc, oneshot},
};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::{
    backend::BackendClient,
    chain::{ChainConfig, ChainGateway},
    common::error::EscrowError,
    countdown::{Countdown, CountdownMsg, Remaining},
    policy::{actions_for, ActionSpec, TradeAction},
    sequencer::{SequencerEvent, SequencerStep, TxSequencer},
    sync::{PushTransport, SyncChannel, SyncEvent},
    trade::{Role, TradeRecord, TradeStatus},
};

/// Notifications pushed to whoever renders the trade view.
#[derive(Debug)]
pub enum TraderNotif {
    /// The cached record or the permitted action set changed.
    Updated {
        trade: TradeRecord,
        actions: Vec<ActionSpec>,
    },
    Countdown(Remaining),
    /// The local deadline elapsed; the backend's own expiry ruling follows
    /// through the push channel.
    CountdownExpired,
    ActionStep {
        action: TradeAction,
        step: SequencerStep,
    },
    /// The sequence finished; the backend's observation of the chain event
    /// drives the actual status transition.
    ActionSubmitted { action: TradeAction },
    ActionFailed {
        action: TradeAction,
        error: EscrowError,
    },
    /// A status tag outside the known lifecycle set - a defect, surfaced
    /// rather than crashed on.
    UnknownStatus { trade_id: Uuid, raw: String },
}

#[derive(Clone)]
pub struct TraderAccess {
    tx: mpsc::Sender<TraderRequest>,
}

impl TraderAccess {
    pub(super) fn new(tx: mpsc::Sender<TraderRequest>) -> Self {
        Self { tx }
    }

    pub async fn trade(&self) -> TradeRecord {
        let (rsp_tx, rsp_rx) = oneshot::channel::<TradeRecord>();
        let request = TraderRequest::Trade { rsp_tx };
        self.tx.send(request).await.unwrap();
        rsp_rx.await.unwrap()
    }

    pub async fn role(&self) -> Role {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Role>();
        let request = TraderRequest::Role { rsp_tx };
        self.tx.send(request).await.unwrap();
        rsp_rx.await.unwrap()
    }

    /// Actions the current role may trigger right now. Empty while a
    /// sequence is outstanding and in any terminal or unknown state.
    pub async fn actions(&self) -> Vec<ActionSpec> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Vec<ActionSpec>>();
        let request = TraderRequest::Actions { rsp_tx };
        self.tx.send(request).await.unwrap();
        rsp_rx.await.unwrap()
    }

    /// Joins the trade as the buyer, registering the wallet that will
    /// receive the escrowed tokens.
    pub async fn join(&self, buyer_wallet: Address) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = TraderRequest::Join {
            buyer_wallet,
            rsp_tx,
        };
        self.tx.send(request).await.unwrap();
        rsp_rx.await.unwrap()
    }

    /// Starts one escrow operation. `confirmed` asserts that the user
    /// explicitly acknowledged an irreversible effect; actions flagged as
    /// requiring confirmation are refused without it. Returns as soon as the
    /// sequence is accepted - progress and outcome arrive as notifications.
    pub async fn execute(
        &self,
        action: TradeAction,
        confirmed: bool,
    ) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = TraderRequest::Execute {
            action,
            confirmed,
            rsp_tx,
        };
        self.tx.send(request).await.unwrap();
        rsp_rx.await.unwrap()
    }

    pub async fn register_notif_tx(
        &self,
        tx: mpsc::Sender<TraderNotif>,
    ) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = TraderRequest::RegisterNotifTx { tx, rsp_tx };
        self.tx.send(request).await.unwrap();
        rsp_rx.await.unwrap()
    }

    pub async fn unregister_notif_tx(&self) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = TraderRequest::UnregisterNotifTx { rsp_tx };
        self.tx.send(request).await.unwrap();
        rsp_rx.await.unwrap()
    }

    pub async fn shutdown(&self) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = TraderRequest::Shutdown { rsp_tx };
        self.tx.send(request).await?; // Shutdown is allowed to fail if already shutdown
        rsp_rx.await?
    }
}

/// The Trade Lifecycle Orchestrator: owns the cached record and role for one
/// trade view, derives the permitted actions, runs sequences, and applies
/// updates arriving from the sync channel.
pub(crate) struct Trader {
    tx: mpsc::Sender<TraderRequest>,
    pub(crate) task_handle: tokio::task::JoinHandle<()>,
}

impl Trader {
    const TRADER_REQUEST_CHANNEL_SIZE: usize = 10;

    pub(crate) fn new(
        trade: TradeRecord,
        role: Role,
        backend: BackendClient,
        gateway: Arc<dyn ChainGateway>,
        chain_config: ChainConfig,
        transport: Arc<dyn PushTransport>,
        ws_url: url::Url,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<TraderRequest>(Self::TRADER_REQUEST_CHANNEL_SIZE);
        let actor = TraderActor::new(
            rx,
            trade,
            role,
            backend,
            gateway,
            chain_config,
            transport,
            ws_url,
        );
        let task_handle = tokio::spawn(async move { actor.run().await });
        Self { tx, task_handle }
    }

    pub(crate) fn new_accessor(&self) -> TraderAccess {
        TraderAccess::new(self.tx.clone())
    }
}

#[derive(Display, IntoStaticStr)]
pub(super) enum TraderRequest {
    Trade {
        rsp_tx: oneshot::Sender<TradeRecord>,
    },
    Role {
        rsp_tx: oneshot::Sender<Role>,
    },
    Actions {
        rsp_tx: oneshot::Sender<Vec<ActionSpec>>,
    },
    Join {
        buyer_wallet: Address,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
    Execute {
        action: TradeAction,
        confirmed: bool,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
    RegisterNotifTx {
        tx: mpsc::Sender<TraderNotif>,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
    UnregisterNotifTx {
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
    Shutdown {
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
}

enum IgnoreReason {
    OtherTrade,
    Duplicate,
    Stale,
}

enum ApplyDecision {
    Ignore(IgnoreReason),
    Apply { expires_changed: bool },
}

/// The monotonicity and idempotence rules of `apply`, kept pure so they can
/// be tested without the actor machinery.
fn decide_apply(current: &TradeRecord, update: &TradeRecord) -> ApplyDecision {
    if update.id != current.id {
        return ApplyDecision::Ignore(IgnoreReason::OtherTrade);
    }
    if update == current {
        return ApplyDecision::Ignore(IgnoreReason::Duplicate);
    }

    let stale = if current.status.is_terminal() {
        // Terminal is final: only same-status field refreshes get through
        update.status != current.status
    } else if update.status.is_terminal() {
        false
    } else {
        match (current.status.rank(), update.status.rank()) {
            (Some(current_rank), Some(update_rank)) => update_rank < current_rank,
            _ => false,
        }
    };
    if stale {
        return ApplyDecision::Ignore(IgnoreReason::Stale);
    }

    ApplyDecision::Apply {
        expires_changed: update.expires_at != current.expires_at,
    }
}

struct TraderActor {
    rx: mpsc::Receiver<TraderRequest>,
    trade: TradeRecord,
    role: Role,
    backend: BackendClient,
    gateway: Arc<dyn ChainGateway>,
    chain_config: ChainConfig,
    in_flight: Option<TradeAction>,
    countdown: Option<Countdown>,
    tick_tx: mpsc::Sender<CountdownMsg>,
    tick_rx: mpsc::Receiver<CountdownMsg>,
    seq_tx: mpsc::Sender<SequencerEvent>,
    seq_rx: mpsc::Receiver<SequencerEvent>,
    sync_rx: mpsc::Receiver<SyncEvent>,
    sync_channel: Option<SyncChannel>,
    notif_tx: Option<mpsc::Sender<TraderNotif>>,
}

impl TraderActor {
    const SYNC_EVENT_CHANNEL_SIZE: usize = 16;
    const SEQUENCER_EVENT_CHANNEL_SIZE: usize = 32;
    const COUNTDOWN_CHANNEL_SIZE: usize = 4;

    #[allow(clippy::too_many_arguments)]
    fn new(
        rx: mpsc::Receiver<TraderRequest>,
        trade: TradeRecord,
        role: Role,
        backend: BackendClient,
        gateway: Arc<dyn ChainGateway>,
        chain_config: ChainConfig,
        transport: Arc<dyn PushTransport>,
        ws_url: url::Url,
    ) -> Self {
        let (sync_tx, sync_rx) = mpsc::channel::<SyncEvent>(Self::SYNC_EVENT_CHANNEL_SIZE);
        let (seq_tx, seq_rx) =
            mpsc::channel::<SequencerEvent>(Self::SEQUENCER_EVENT_CHANNEL_SIZE);
        let (tick_tx, tick_rx) = mpsc::channel::<CountdownMsg>(Self::COUNTDOWN_CHANNEL_SIZE);

        let sync_channel = SyncChannel::start(trade.id, ws_url, transport, sync_tx);

        TraderActor {
            rx,
            trade,
            role,
            backend,
            gateway,
            chain_config,
            in_flight: None,
            countdown: None,
            tick_tx,
            tick_rx,
            seq_tx,
            seq_rx,
            sync_rx,
            sync_channel: Some(sync_channel),
            notif_tx: None,
        }
    }

    async fn run(mut self) {
        if let Some(expires_at) = self.trade.expires_at {
            self.countdown = Some(Countdown::start(expires_at, self.tick_tx.clone()));
        }

        loop {
            select! {
                Some(request) = self.rx.recv() => {
                    if self.handle_request(request).await {
                        break;
                    }
                },
                Some(event) = self.sync_rx.recv() => {
                    self.handle_sync_event(event).await;
                },
                Some(event) = self.seq_rx.recv() => {
                    self.handle_sequencer_event(event).await;
                },
                Some(msg) = self.tick_rx.recv() => {
                    self.handle_countdown_msg(msg).await;
                },
                else => break,
            }
        }

        if let Some(sync_channel) = self.sync_channel.take() {
            sync_channel.terminate();
        }
        if let Some(countdown) = self.countdown.take() {
            countdown.stop();
        }
        info!("Trader for trade {} terminating", self.trade.id);
    }

    // Top-down request handling

    async fn handle_request(&mut self, request: TraderRequest) -> bool {
        let mut terminate = false;

        debug!(
            "Trader for trade {} handle_request() of type {}",
            self.trade.id, request
        );

        match request {
            TraderRequest::Trade { rsp_tx } => {
                rsp_tx.send(self.trade.clone()).unwrap(); // oneshot should not fail
            }
            TraderRequest::Role { rsp_tx } => {
                rsp_tx.send(self.role).unwrap(); // oneshot should not fail
            }
            TraderRequest::Actions { rsp_tx } => {
                rsp_tx.send(self.current_actions()).unwrap(); // oneshot should not fail
            }
            TraderRequest::Join {
                buyer_wallet,
                rsp_tx,
            } => {
                self.join(buyer_wallet, rsp_tx).await;
            }
            TraderRequest::Execute {
                action,
                confirmed,
                rsp_tx,
            } => {
                self.execute(action, confirmed, rsp_tx).await;
            }
            TraderRequest::RegisterNotifTx { tx, rsp_tx } => {
                self.register_notif_tx(tx, rsp_tx);
            }
            TraderRequest::UnregisterNotifTx { rsp_tx } => {
                self.unregister_notif_tx(rsp_tx);
            }
            TraderRequest::Shutdown { rsp_tx } => {
                rsp_tx.send(Ok(())).unwrap(); // oneshot should not fail
                terminate = true;
            }
        }
        terminate
    }

    fn current_actions(&self) -> Vec<ActionSpec> {
        // The action surface is disabled while a sequence is outstanding
        if self.in_flight.is_some() {
            return vec![];
        }
        actions_for(self.role, &self.trade.status)
    }

    async fn join(
        &mut self,
        buyer_wallet: Address,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    ) {
        match self.backend.join_trade(self.trade.id, buyer_wallet).await {
            Ok(record) => {
                self.apply(record).await;
                rsp_tx.send(Ok(())).unwrap(); // oneshot should not fail
            }
            Err(error) => {
                rsp_tx.send(Err(error)).unwrap(); // oneshot should not fail
            }
        }
    }

    async fn execute(
        &mut self,
        action: TradeAction,
        confirmed: bool,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    ) {
        if let Some(in_flight) = self.in_flight {
            let error = EscrowError::Simple(format!(
                "Trade {} already has {} in flight",
                self.trade.id, in_flight
            ));
            rsp_tx.send(Err(error)).unwrap(); // oneshot should not fail
            return;
        }

        let Some(spec) = actions_for(self.role, &self.trade.status)
            .into_iter()
            .find(|spec| spec.action == action)
        else {
            let error = EscrowError::Simple(format!(
                "Action {} not permitted for {} at status {}",
                action, self.role, self.trade.status
            ));
            rsp_tx.send(Err(error)).unwrap(); // oneshot should not fail
            return;
        };

        if spec.requires_confirmation && !confirmed {
            let error = EscrowError::Validation(format!(
                "Action {} is irreversible and requires explicit confirmation",
                action
            ));
            rsp_tx.send(Err(error)).unwrap(); // oneshot should not fail
            return;
        }

        self.in_flight = Some(action);
        let sequencer = TxSequencer::new(
            self.gateway.clone(),
            self.chain_config.clone(),
            self.seq_tx.clone(),
        );
        sequencer.spawn(action, self.trade.clone());

        self.notify_updated().await;
        rsp_tx.send(Ok(())).unwrap(); // oneshot should not fail
    }

    fn register_notif_tx(
        &mut self,
        tx: mpsc::Sender<TraderNotif>,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    ) {
        let mut result = Ok(());
        if self.notif_tx.is_some() {
            let error = EscrowError::Simple(format!(
                "Trader for trade {} already has notif_tx registered",
                self.trade.id
            ));
            result = Err(error);
        }
        self.notif_tx = Some(tx);
        rsp_tx.send(result).unwrap();
    }

    fn unregister_notif_tx(&mut self, rsp_tx: oneshot::Sender<Result<(), EscrowError>>) {
        let mut result = Ok(());
        if self.notif_tx.is_none() {
            let error = EscrowError::Simple(format!(
                "Trader for trade {} expected to have notif_tx registered",
                self.trade.id
            ));
            result = Err(error);
        }
        self.notif_tx = None;
        rsp_tx.send(result).unwrap();
    }

    // Bottom-up event handling

    async fn handle_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Connected => {
                // Close the delivery gap; the channel replays nothing
                match self.backend.get_trade(self.trade.id).await {
                    Ok(record) => self.apply(record).await,
                    Err(error) => {
                        debug!(
                            "Trader for trade {} catch-up fetch failed - {}",
                            self.trade.id, error
                        );
                    }
                }
            }
            SyncEvent::Update(record) => self.apply(record).await,
        }
    }

    /// Replaces the cached record with a fresher snapshot. Idempotent, never
    /// regresses, and only restarts the countdown when the deadline moved.
    async fn apply(&mut self, update: TradeRecord) {
        match decide_apply(&self.trade, &update) {
            ApplyDecision::Ignore(IgnoreReason::OtherTrade) => {
                warn!(
                    "Trader for trade {} ignoring update for other trade {}",
                    self.trade.id, update.id
                );
            }
            ApplyDecision::Ignore(IgnoreReason::Duplicate) => {
                trace!(
                    "Trader for trade {} ignoring duplicate snapshot",
                    self.trade.id
                );
            }
            ApplyDecision::Ignore(IgnoreReason::Stale) => {
                debug!(
                    "Trader for trade {} dropping stale update with status {}",
                    self.trade.id, update.status
                );
            }
            ApplyDecision::Apply { expires_changed } => {
                if let TradeStatus::Unknown(raw) = &update.status {
                    error!(
                        "Trader for trade {} received unknown status value {}",
                        self.trade.id, raw
                    );
                    let notif = TraderNotif::UnknownStatus {
                        trade_id: self.trade.id,
                        raw: raw.clone(),
                    };
                    self.notify(notif).await;
                }

                self.trade = update;
                if expires_changed {
                    self.restart_countdown();
                }
                self.notify_updated().await;
            }
        }
    }

    async fn handle_sequencer_event(&mut self, event: SequencerEvent) {
        match event {
            SequencerEvent::Step { action, step } => {
                debug!(
                    "Trade {} sequence {} reached step {}",
                    self.trade.id, action, step
                );
                self.notify(TraderNotif::ActionStep { action, step }).await;
            }
            SequencerEvent::Done { action, result } => {
                self.in_flight = None;
                match result {
                    Ok(()) => {
                        // Optimistic: the status transition itself arrives
                        // from the backend through the sync channel
                        self.notify(TraderNotif::ActionSubmitted { action }).await;
                    }
                    Err(error) => {
                        error!(
                            "Trade {} sequence {} failed - {}",
                            self.trade.id, action, error
                        );
                        self.notify(TraderNotif::ActionFailed { action, error })
                            .await;
                    }
                }
                // Restore the action surface to its pre-attempt state
                self.notify_updated().await;
            }
        }
    }

    async fn handle_countdown_msg(&mut self, msg: CountdownMsg) {
        match msg {
            CountdownMsg::Tick(remaining) => {
                self.notify(TraderNotif::Countdown(remaining)).await;
            }
            CountdownMsg::Expired => {
                self.countdown = None;
                self.notify(TraderNotif::CountdownExpired).await;
            }
        }
    }

    fn restart_countdown(&mut self) {
        if self.countdown.as_ref().map(|countdown| countdown.expires_at())
            == self.trade.expires_at
        {
            return;
        }
        if let Some(countdown) = self.countdown.take() {
            countdown.stop();
        }
        if let Some(expires_at) = self.trade.expires_at {
            self.countdown = Some(Countdown::start(expires_at, self.tick_tx.clone()));
        }
    }

    async fn notify_updated(&mut self) {
        let notif = TraderNotif::Updated {
            trade: self.trade.clone(),
            actions: self.current_actions(),
        };
        self.notify(notif).await;
    }

    async fn notify(&mut self, notif: TraderNotif) {
        if let Some(tx) = &self.notif_tx {
            if let Err(error) = tx.send(notif).await {
                error!(
                    "Trader for trade {} failed notifying user - {}",
                    self.trade.id, error
                );
            }
        } else {
            trace!(
                "Trader for trade {} has no notif_tx registered",
                self.trade.id
            );
        }
    }
}
