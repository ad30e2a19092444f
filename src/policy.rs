use strum_macros::{Display, EnumString, IntoStaticStr};

use crate::trade::{Role, TradeStatus};

/// One escrow operation a user can trigger from the trade view.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumString, Display, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum TradeAction {
    DepositToEscrow,
    ConfirmFiatSent,
    Release,
    Refund,
    ClaimByTimeout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionSpec {
    pub action: TradeAction,
    /// Irreversible effect - the caller must collect an explicit user
    /// confirmation before invoking the sequencer.
    pub requires_confirmation: bool,
}

impl ActionSpec {
    fn unconfirmed(action: TradeAction) -> Self {
        ActionSpec {
            action,
            requires_confirmation: false,
        }
    }

    fn confirmed(action: TradeAction) -> Self {
        ActionSpec {
            action,
            requires_confirmation: true,
        }
    }
}

/// Pure table from (role, status) to the permitted actions, in presentation
/// order. Any pair not listed yields the empty list - no action is ever
/// inferred, and terminal or unknown states render none.
pub fn actions_for(role: Role, status: &TradeStatus) -> Vec<ActionSpec> {
    match (role, status) {
        (Role::Seller, TradeStatus::Joined) => {
            vec![ActionSpec::unconfirmed(TradeAction::DepositToEscrow)]
        }
        (Role::Seller, TradeStatus::UsdcEscrowed) => {
            vec![ActionSpec::confirmed(TradeAction::Refund)]
        }
        (Role::Seller, TradeStatus::FiatSent) => {
            vec![ActionSpec::confirmed(TradeAction::Release)]
        }
        (Role::Buyer, TradeStatus::UsdcEscrowed) => {
            vec![ActionSpec::confirmed(TradeAction::ConfirmFiatSent)]
        }
        // The 24h claim window itself is enforced by the escrow contract;
        // the action is exposed as soon as fiat confirmation is on record.
        (Role::Buyer, TradeStatus::FiatSent) => {
            vec![ActionSpec::confirmed(TradeAction::ClaimByTimeout)]
        }
        _ => vec![],
    }
}
