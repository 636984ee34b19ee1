//! The stake ledger: account registration, deposits, stake reservation, and
//! one-shot settlement of terminal sessions.
//!
//! Account balances are shared mutable state across concurrent sessions, so
//! every read-modify-write cycle holds that account's lock. Ledger entries
//! are append-only; for each (account, pool) the balance equals the sum of
//! entry deltas.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gridstake_types::account::{Account, EntryReason, LedgerEntry, Pool};
use gridstake_types::commission::{CommissionFund, CommissionRecord};
use gridstake_types::constants::{MAX_NAME_LENGTH, MIN_STAKE, STARTING_PRACTICE_BALANCE};
use gridstake_types::session::{AuditKind, GameSession, SessionPhase, SessionResult};
use gridstake_types::store::{StoreKey, Value};
use tracing::{debug, info};

use crate::gateway::{self, PersistenceGateway};
use crate::policy::{compute_settlement, Settlement, StakeOutcome};
use crate::{lock, EngineError};

/// Result of a successful settlement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementReceipt {
    pub session: u64,
    pub outcome: StakeOutcome,
    pub settlement: Settlement,
    /// Entries appended by this settlement; empty on a loss.
    pub entries: Vec<LedgerEntry>,
}

/// Owns balances and the commission fund.
pub struct StakeLedger<G: PersistenceGateway> {
    gateway: Arc<G>,
    locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl<G: PersistenceGateway> StakeLedger<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create an account and grant the starting practice balance.
    pub fn register_account(&self, id: u64, name: &str, now: u64) -> Result<Account, EngineError> {
        if name.len() > MAX_NAME_LENGTH {
            return Err(EngineError::InvalidRequest {
                reason: "account name too long",
            });
        }

        let guard = self.account_lock(id);
        let _held = lock(&guard);

        if self.load_account(id)?.is_some() {
            return Err(EngineError::AccountExists(id));
        }

        let mut account = Account::new(id, name.to_string(), now);
        account.practice_balance = STARTING_PRACTICE_BALANCE;
        self.store_account(&account)?;
        self.append_entry(LedgerEntry {
            account: id,
            pool: Pool::Practice,
            delta: STARTING_PRACTICE_BALANCE as i64,
            reason: EntryReason::Deposit,
            session: None,
            at: now,
        })?;

        info!(account = id, "account registered");
        Ok(account)
    }

    /// External credit from the payment processor (`creditSuccessful`).
    pub fn deposit(
        &self,
        id: u64,
        pool: Pool,
        amount: u64,
        now: u64,
    ) -> Result<Account, EngineError> {
        let guard = self.account_lock(id);
        let _held = lock(&guard);

        let mut account = self
            .load_account(id)?
            .ok_or(EngineError::AccountNotFound(id))?;
        *account.balance_mut(pool) = account.balance(pool).saturating_add(amount);
        self.store_account(&account)?;
        self.append_entry(LedgerEntry {
            account: id,
            pool,
            delta: amount as i64,
            reason: EntryReason::Deposit,
            session: None,
            at: now,
        })?;

        debug!(account = id, ?pool, amount, "deposit credited");
        Ok(account)
    }

    /// Debit `amount` from the chosen pool for a session about to start.
    /// Fails without mutation when the stake is below the minimum or the
    /// pool cannot cover it.
    pub fn reserve(
        &self,
        id: u64,
        pool: Pool,
        amount: u64,
        session: u64,
        now: u64,
    ) -> Result<LedgerEntry, EngineError> {
        if amount < MIN_STAKE {
            return Err(EngineError::StakeBelowMinimum {
                stake: amount,
                min: MIN_STAKE,
            });
        }

        let guard = self.account_lock(id);
        let _held = lock(&guard);

        let mut account = self
            .load_account(id)?
            .ok_or(EngineError::AccountNotFound(id))?;
        let available = account.balance(pool);
        if available < amount {
            return Err(EngineError::InsufficientFunds {
                available,
                required: amount,
            });
        }

        *account.balance_mut(pool) = available - amount;
        let entry = LedgerEntry {
            account: id,
            pool,
            delta: -(amount as i64),
            reason: EntryReason::Reserve,
            session: Some(session),
            at: now,
        };
        self.store_account(&account)?;
        self.append_entry(entry.clone())?;

        debug!(account = id, session, ?pool, amount, "stake reserved");
        Ok(entry)
    }

    /// Finalize a terminal session's financial outcome, exactly once.
    ///
    /// Appends one Refund (draw) or Payout (win) entry, or nothing on a loss
    /// where the reserve debit stands. The session transitions to `Settled`
    /// only after every write lands; on failure it stays `Terminal` and the
    /// error surfaces for manual reconciliation.
    pub fn settle(
        &self,
        session: &mut GameSession,
        now: u64,
    ) -> Result<SettlementReceipt, EngineError> {
        match session.phase {
            SessionPhase::Settled => return Err(EngineError::AlreadySettled(session.id)),
            SessionPhase::Terminal => {}
            _ => return Err(EngineError::SessionNotTerminal(session.id)),
        }
        let outcome = match session.result {
            SessionResult::Unset => return Err(EngineError::SessionNotTerminal(session.id)),
            SessionResult::Win(mark) if mark == session.player_mark => StakeOutcome::Won,
            SessionResult::Win(_) => StakeOutcome::Lost,
            SessionResult::Draw => StakeOutcome::Drawn,
        };
        let settlement = compute_settlement(session.stake, session.pool, outcome, session.opponent);

        let guard = self.account_lock(session.account);
        let _held = lock(&guard);

        let mut account = self
            .load_account(session.account)?
            .ok_or(EngineError::AccountNotFound(session.account))?;

        // A retry after a partial failure must not pay twice: the settlement
        // entry doubles as the marker that the money step already landed.
        let already_paid = self.entries(session.account)?.iter().any(|entry| {
            entry.session == Some(session.id)
                && matches!(entry.reason, EntryReason::Refund | EntryReason::Payout)
        });

        let mut entries = Vec::new();
        if !already_paid {
            match outcome {
                StakeOutcome::Drawn => entries.push(LedgerEntry {
                    account: session.account,
                    pool: session.pool,
                    delta: settlement.net as i64,
                    reason: EntryReason::Refund,
                    session: Some(session.id),
                    at: now,
                }),
                StakeOutcome::Won => entries.push(LedgerEntry {
                    account: session.account,
                    pool: session.pool,
                    delta: settlement.net as i64,
                    reason: EntryReason::Payout,
                    session: Some(session.id),
                    at: now,
                }),
                StakeOutcome::Lost => {}
            }

            *account.balance_mut(session.pool) =
                account.balance(session.pool).saturating_add(settlement.net);
            account.games_played += 1;
            if outcome == StakeOutcome::Won {
                account.games_won += 1;
            }
            account.commission_paid =
                account.commission_paid.saturating_add(settlement.commission);

            // Marker entry first, then the account snapshot, then the
            // commission records, then the session with its settled phase.
            // Any failure leaves the session Terminal for an external retry.
            for entry in &entries {
                self.append_entry(entry.clone())?;
            }
            self.store_account(&account)?;
        }
        if settlement.commission > 0 {
            self.accrue_commission(session, settlement.commission, now)?;
        }

        let mut settled = session.clone();
        settled.phase = SessionPhase::Settled;
        settled.settled_at = Some(now);
        settled.record(now, AuditKind::Settled);
        gateway::save(
            self.gateway.as_ref(),
            &StoreKey::Session(settled.id),
            &Value::Session(settled.clone()),
        )?;
        *session = settled;

        info!(
            session = session.id,
            account = session.account,
            ?outcome,
            net = settlement.net,
            commission = settlement.commission,
            "session settled"
        );
        Ok(SettlementReceipt {
            session: session.id,
            outcome,
            settlement,
            entries,
        })
    }

    /// Account snapshot.
    pub fn account(&self, id: u64) -> Result<Account, EngineError> {
        self.load_account(id)?
            .ok_or(EngineError::AccountNotFound(id))
    }

    /// All ledger entries for an account, oldest first.
    pub fn entries(&self, id: u64) -> Result<Vec<LedgerEntry>, EngineError> {
        match gateway::load(self.gateway.as_ref(), &StoreKey::Ledger(id))? {
            Some(Value::Ledger(entries)) => Ok(entries),
            Some(_) => Err(gateway::corrupt("ledger")),
            None => Ok(Vec::new()),
        }
    }

    /// Current commission fund aggregates.
    pub fn commission_fund(&self) -> Result<CommissionFund, EngineError> {
        match gateway::load(self.gateway.as_ref(), &StoreKey::CommissionFund)? {
            Some(Value::CommissionFund(fund)) => Ok(fund),
            Some(_) => Err(gateway::corrupt("commission fund")),
            None => Ok(CommissionFund::default()),
        }
    }

    /// Global commission history, oldest first.
    pub fn commission_history(&self) -> Result<Vec<CommissionRecord>, EngineError> {
        match gateway::load(self.gateway.as_ref(), &StoreKey::CommissionHistory)? {
            Some(Value::CommissionHistory(records)) => Ok(records),
            Some(_) => Err(gateway::corrupt("commission history")),
            None => Ok(Vec::new()),
        }
    }

    /// At most one commission record per session; the history record is the
    /// marker that the fund was already charged.
    fn accrue_commission(
        &self,
        session: &GameSession,
        amount: u64,
        now: u64,
    ) -> Result<(), EngineError> {
        let mut history = self.commission_history()?;
        if history.iter().any(|record| record.session == session.id) {
            return Ok(());
        }
        history.push(CommissionRecord {
            session: session.id,
            account: session.account,
            stake: session.stake,
            amount,
            accrued_at: now,
        });
        gateway::save(
            self.gateway.as_ref(),
            &StoreKey::CommissionHistory,
            &Value::CommissionHistory(history),
        )?;

        let mut fund = match gateway::load(self.gateway.as_ref(), &StoreKey::CommissionFund)? {
            Some(Value::CommissionFund(fund)) => fund,
            Some(_) => return Err(gateway::corrupt("commission fund")),
            None => CommissionFund::new(now),
        };
        fund.accrue(amount, now);
        gateway::save(
            self.gateway.as_ref(),
            &StoreKey::CommissionFund,
            &Value::CommissionFund(fund),
        )
    }

    fn account_lock(&self, id: u64) -> Arc<Mutex<()>> {
        lock(&self.locks).entry(id).or_default().clone()
    }

    fn load_account(&self, id: u64) -> Result<Option<Account>, EngineError> {
        match gateway::load(self.gateway.as_ref(), &StoreKey::Account(id))? {
            Some(Value::Account(account)) => Ok(Some(account)),
            Some(_) => Err(gateway::corrupt("account")),
            None => Ok(None),
        }
    }

    fn store_account(&self, account: &Account) -> Result<(), EngineError> {
        gateway::save(
            self.gateway.as_ref(),
            &StoreKey::Account(account.id),
            &Value::Account(account.clone()),
        )
    }

    fn append_entry(&self, entry: LedgerEntry) -> Result<(), EngineError> {
        let mut entries = self.entries(entry.account)?;
        let key = StoreKey::Ledger(entry.account);
        entries.push(entry);
        gateway::save(self.gateway.as_ref(), &key, &Value::Ledger(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Memory;
    use gridstake_types::board::Mark;
    use gridstake_types::session::{Difficulty, GameMode, OpponentKind};

    fn ledger() -> StakeLedger<Memory> {
        StakeLedger::new(Arc::new(Memory::default()))
    }

    fn terminal_session(
        id: u64,
        account: u64,
        pool: Pool,
        stake: u64,
        opponent: OpponentKind,
        result: SessionResult,
    ) -> GameSession {
        let mode = match opponent {
            OpponentKind::Bot => GameMode::BotMatch,
            OpponentKind::Human => GameMode::OnlineMatch,
        };
        let difficulty = match opponent {
            OpponentKind::Bot => Some(Difficulty::Medium),
            OpponentKind::Human => None,
        };
        let mut session =
            GameSession::new(id, account, mode, pool, stake, opponent, difficulty, Mark::X, 100);
        session.phase = SessionPhase::Terminal;
        session.result = result;
        session
    }

    #[test]
    fn test_registration_grants_starting_balance_once() {
        let ledger = ledger();
        let account = ledger.register_account(1, "Ada", 10).expect("register failed");
        assert_eq!(account.practice_balance, STARTING_PRACTICE_BALANCE);
        assert_eq!(account.real_balance, 0);

        assert_eq!(
            ledger.register_account(1, "Ada", 11),
            Err(EngineError::AccountExists(1))
        );
    }

    #[test]
    fn test_reserve_conserves_funds() {
        let ledger = ledger();
        ledger.register_account(1, "Ada", 10).expect("register failed");

        ledger
            .reserve(1, Pool::Practice, 100, 7, 11)
            .expect("reserve failed");
        let account = ledger.account(1).expect("account missing");
        assert_eq!(account.practice_balance, STARTING_PRACTICE_BALANCE - 100);
    }

    #[test]
    fn test_reserve_rejects_overdraw_without_mutation() {
        let ledger = ledger();
        ledger.register_account(1, "Ada", 10).expect("register failed");
        ledger.deposit(1, Pool::Real, 50, 10).expect("deposit failed");

        assert_eq!(
            ledger.reserve(1, Pool::Real, 51, 7, 11),
            Err(EngineError::InsufficientFunds {
                available: 50,
                required: 51
            })
        );
        let account = ledger.account(1).expect("account missing");
        assert_eq!(account.real_balance, 50);
        // Only the registration grant and the deposit were written.
        let entries = ledger.entries(1).expect("entries failed");
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_reserve_enforces_minimum_stake() {
        let ledger = ledger();
        ledger.register_account(1, "Ada", 10).expect("register failed");

        assert_eq!(
            ledger.reserve(1, Pool::Practice, 0, 7, 11),
            Err(EngineError::StakeBelowMinimum {
                stake: 0,
                min: MIN_STAKE
            })
        );
    }

    #[test]
    fn test_settle_win_with_commission() {
        // Scenario A: stake 100, real pool, online win.
        let ledger = ledger();
        ledger.register_account(1, "Ada", 10).expect("register failed");
        ledger
            .deposit(1, Pool::Real, 500, 10)
            .expect("deposit failed");
        ledger
            .reserve(1, Pool::Real, 100, 7, 11)
            .expect("reserve failed");

        let mut session = terminal_session(
            7,
            1,
            Pool::Real,
            100,
            OpponentKind::Human,
            SessionResult::Win(Mark::X),
        );
        let receipt = ledger.settle(&mut session, 12).expect("settle failed");

        assert_eq!(receipt.settlement.gross, 200);
        assert_eq!(receipt.settlement.commission, 10);
        assert_eq!(receipt.settlement.net, 190);

        let account = ledger.account(1).expect("account missing");
        assert_eq!(account.real_balance, 500 - 100 + 190);
        assert_eq!(account.games_played, 1);
        assert_eq!(account.games_won, 1);
        assert_eq!(account.commission_paid, 10);

        let fund = ledger.commission_fund().expect("fund failed");
        assert_eq!(fund.total, 10);
        let history = ledger.commission_history().expect("history failed");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].session, 7);
        assert_eq!(history[0].amount, 10);
    }

    #[test]
    fn test_settle_practice_bot_win_no_commission() {
        // Scenario B: stake 50, practice pool, bot win.
        let ledger = ledger();
        ledger.register_account(1, "Ada", 10).expect("register failed");
        ledger
            .reserve(1, Pool::Practice, 50, 7, 11)
            .expect("reserve failed");

        let mut session = terminal_session(
            7,
            1,
            Pool::Practice,
            50,
            OpponentKind::Bot,
            SessionResult::Win(Mark::X),
        );
        let receipt = ledger.settle(&mut session, 12).expect("settle failed");

        assert_eq!(receipt.settlement.net, 100);
        assert_eq!(receipt.settlement.commission, 0);
        let account = ledger.account(1).expect("account missing");
        assert_eq!(
            account.practice_balance,
            STARTING_PRACTICE_BALANCE - 50 + 100
        );
        assert!(ledger
            .commission_history()
            .expect("history failed")
            .is_empty());
    }

    #[test]
    fn test_settle_draw_refunds() {
        // Scenario C: stake 30, draw: exact refund.
        let ledger = ledger();
        ledger.register_account(1, "Ada", 10).expect("register failed");
        ledger
            .reserve(1, Pool::Practice, 30, 7, 11)
            .expect("reserve failed");

        let mut session = terminal_session(
            7,
            1,
            Pool::Practice,
            30,
            OpponentKind::Bot,
            SessionResult::Draw,
        );
        let receipt = ledger.settle(&mut session, 12).expect("settle failed");

        assert_eq!(receipt.entries.len(), 1);
        assert_eq!(receipt.entries[0].reason, EntryReason::Refund);
        assert_eq!(receipt.entries[0].delta, 30);
        let account = ledger.account(1).expect("account missing");
        assert_eq!(account.practice_balance, STARTING_PRACTICE_BALANCE);
    }

    #[test]
    fn test_settle_loss_appends_nothing() {
        // Scenario D: stake 20, loss: the reserve debit is final.
        let ledger = ledger();
        ledger.register_account(1, "Ada", 10).expect("register failed");
        ledger
            .reserve(1, Pool::Practice, 20, 7, 11)
            .expect("reserve failed");
        let before = ledger.entries(1).expect("entries failed").len();

        let mut session = terminal_session(
            7,
            1,
            Pool::Practice,
            20,
            OpponentKind::Bot,
            SessionResult::Win(Mark::O),
        );
        let receipt = ledger.settle(&mut session, 12).expect("settle failed");

        assert_eq!(receipt.outcome, StakeOutcome::Lost);
        assert!(receipt.entries.is_empty());
        assert_eq!(ledger.entries(1).expect("entries failed").len(), before);
        let account = ledger.account(1).expect("account missing");
        assert_eq!(account.practice_balance, STARTING_PRACTICE_BALANCE - 20);
        assert_eq!(account.games_played, 1);
        assert_eq!(account.games_won, 0);
    }

    #[test]
    fn test_settlement_is_idempotent() {
        let ledger = ledger();
        ledger.register_account(1, "Ada", 10).expect("register failed");
        ledger
            .reserve(1, Pool::Practice, 30, 7, 11)
            .expect("reserve failed");

        let mut session = terminal_session(
            7,
            1,
            Pool::Practice,
            30,
            OpponentKind::Bot,
            SessionResult::Draw,
        );
        ledger.settle(&mut session, 12).expect("settle failed");
        let balance = ledger.account(1).expect("account missing").practice_balance;

        assert_eq!(
            ledger.settle(&mut session, 13),
            Err(EngineError::AlreadySettled(7))
        );
        assert_eq!(
            ledger.account(1).expect("account missing").practice_balance,
            balance
        );
    }

    #[test]
    fn test_settle_requires_terminal_phase() {
        let ledger = ledger();
        ledger.register_account(1, "Ada", 10).expect("register failed");

        let mut session = terminal_session(
            7,
            1,
            Pool::Practice,
            30,
            OpponentKind::Bot,
            SessionResult::Draw,
        );
        session.phase = SessionPhase::Active;
        assert_eq!(
            ledger.settle(&mut session, 12),
            Err(EngineError::SessionNotTerminal(7))
        );
    }

    #[test]
    fn test_balances_reconcile_with_entries() {
        let ledger = ledger();
        ledger.register_account(1, "Ada", 10).expect("register failed");
        ledger
            .deposit(1, Pool::Real, 300, 10)
            .expect("deposit failed");
        ledger
            .reserve(1, Pool::Real, 100, 7, 11)
            .expect("reserve failed");
        let mut session = terminal_session(
            7,
            1,
            Pool::Real,
            100,
            OpponentKind::Human,
            SessionResult::Win(Mark::X),
        );
        ledger.settle(&mut session, 12).expect("settle failed");

        let account = ledger.account(1).expect("account missing");
        let entries = ledger.entries(1).expect("entries failed");
        for pool in [Pool::Practice, Pool::Real] {
            let sum: i64 = entries
                .iter()
                .filter(|e| e.pool == pool)
                .map(|e| e.delta)
                .sum();
            assert_eq!(sum, account.balance(pool) as i64);
        }
    }
}
