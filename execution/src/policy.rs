//! Commission policy: pure settlement arithmetic for terminal sessions.

use gridstake_types::account::Pool;
use gridstake_types::constants::{BPS_DENOMINATOR, COMMISSION_RATE_BPS};
use gridstake_types::session::OpponentKind;

/// Terminal outcome from the staking player's perspective.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakeOutcome {
    Won,
    Lost,
    Drawn,
}

/// Financial result of settling a terminal session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Settlement {
    /// Amount owed before commission: stake x2 on a win, the stake itself on
    /// a draw, zero on a loss.
    pub gross: u64,
    pub commission: u64,
    /// Amount actually credited back to the staking player.
    pub net: u64,
}

/// Price a terminal session.
///
/// Commission applies iff the pool is Real, the staker won, and the opponent
/// was not the bot; every other case pays out gross. The stake was already
/// debited at reservation, so a loss produces no further movement.
pub fn compute_settlement(
    stake: u64,
    pool: Pool,
    outcome: StakeOutcome,
    opponent: OpponentKind,
) -> Settlement {
    match outcome {
        StakeOutcome::Lost => Settlement::default(),
        StakeOutcome::Drawn => Settlement {
            gross: stake,
            commission: 0,
            net: stake,
        },
        StakeOutcome::Won => {
            let gross = stake.saturating_mul(2);
            let commission = if pool == Pool::Real && opponent != OpponentKind::Bot {
                gross.saturating_mul(COMMISSION_RATE_BPS) / BPS_DENOMINATOR
            } else {
                0
            };
            Settlement {
                gross,
                commission,
                net: gross - commission,
            }
        }
    }
}
