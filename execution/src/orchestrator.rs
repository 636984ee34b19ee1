//! The session orchestrator: sequences reservation, play, terminal
//! detection, settlement, and bot learning for every live session.
//!
//! Each live session sits behind its own mutex, so one move is fully
//! validated, applied, outcome-checked, and (if terminal) settled before the
//! next is accepted. The bot reply is computed synchronously inside the same
//! critical section; the state space is tiny and never needs to suspend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use gridstake_types::account::{Account, Pool};
use gridstake_types::board::Mark;
use gridstake_types::constants::IDLE_TIMEOUT_SECS;
use gridstake_types::session::{
    AuditKind, Difficulty, GameMode, GameSession, MoveRecord, OpponentKind, SessionPhase,
    SessionResult,
};
use gridstake_types::store::{StoreKey, Value};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::gateway::{self, PersistenceGateway};
use crate::ledger::{SettlementReceipt, StakeLedger};
use crate::opponent::AdaptiveOpponent;
use crate::rules::{self, BoardOutcome};
use crate::{lock, EngineError};

/// Time source for session timestamps and idle expiry.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now(&self) -> u64;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }
}

/// Parameters for opening a wagered session.
#[derive(Clone, Debug)]
pub struct SessionRequest {
    /// Caller-assigned session id; duplicates are rejected.
    pub id: u64,
    /// Authenticated account of the staking player.
    pub account: u64,
    pub mode: GameMode,
    pub pool: Pool,
    pub stake: u64,
    pub opponent: OpponentKind,
    /// Required when the opponent is the bot.
    pub difficulty: Option<Difficulty>,
    /// Seat taken by the staking player. When the bot holds X it opens
    /// immediately.
    pub player_mark: Mark,
}

/// Receipt for a successfully opened session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOpened {
    pub id: u64,
    /// The bot's opening move, when it holds X.
    pub opening: Option<u8>,
}

/// Everything that happened in response to one submitted move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveOutcome {
    pub cell: u8,
    pub mark: Mark,
    /// The bot's synchronous reply, if any.
    pub reply: Option<u8>,
    pub outcome: BoardOutcome,
    /// Present exactly when the move (or the reply) ended the game.
    pub receipt: Option<SettlementReceipt>,
}

/// Owns every live session and guarantees settlement happens exactly once.
pub struct SessionOrchestrator<G: PersistenceGateway> {
    gateway: Arc<G>,
    ledger: StakeLedger<G>,
    opponent: AdaptiveOpponent<G>,
    sessions: Mutex<HashMap<u64, Arc<Mutex<GameSession>>>>,
    clock: Arc<dyn Clock>,
    rng: Mutex<ChaCha8Rng>,
}

impl<G: PersistenceGateway> SessionOrchestrator<G> {
    /// Build an engine over `gateway`. The RNG seed fixes bot play for
    /// reproducible games; pass entropy in production.
    pub fn new(gateway: Arc<G>, clock: Arc<dyn Clock>, rng_seed: u64) -> Self {
        Self {
            ledger: StakeLedger::new(gateway.clone()),
            opponent: AdaptiveOpponent::new(gateway.clone()),
            gateway,
            sessions: Mutex::new(HashMap::new()),
            clock,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(rng_seed)),
        }
    }

    /// The ledger facade, for deposits and balance queries.
    pub fn ledger(&self) -> &StakeLedger<G> {
        &self.ledger
    }

    /// The adaptive opponent, for stats and learning resets.
    pub fn opponent(&self) -> &AdaptiveOpponent<G> {
        &self.opponent
    }

    /// Register an account with the starting practice balance.
    pub fn register_account(&self, id: u64, name: &str) -> Result<Account, EngineError> {
        self.ledger.register_account(id, name, self.clock.now())
    }

    /// Payment-processor callback: credit an external deposit.
    pub fn credit_deposit(&self, id: u64, pool: Pool, amount: u64) -> Result<Account, EngineError> {
        self.ledger.deposit(id, pool, amount, self.clock.now())
    }

    /// Reserve the stake and activate a new session.
    ///
    /// Reservation failure discards the session without side effects. On
    /// success the session is `Active` and, when the bot holds X, its
    /// opening move has already been applied.
    pub fn create_session(&self, request: SessionRequest) -> Result<SessionOpened, EngineError> {
        let now = self.clock.now();
        validate(&request)?;

        // The map guard is held through the insert so racing creates with
        // the same id cannot both reserve a stake.
        let mut sessions = lock(&self.sessions);
        if sessions.contains_key(&request.id) {
            return Err(EngineError::SessionExists(request.id));
        }
        // Ids persist across restarts; reject replays of settled sessions.
        if gateway::load(self.gateway.as_ref(), &StoreKey::Session(request.id))?.is_some() {
            return Err(EngineError::SessionExists(request.id));
        }

        let mut session = GameSession::new(
            request.id,
            request.account,
            request.mode,
            request.pool,
            request.stake,
            request.opponent,
            request.difficulty,
            request.player_mark,
            now,
        );

        self.ledger
            .reserve(request.account, request.pool, request.stake, request.id, now)?;
        session.phase = SessionPhase::StakeReserved;
        session.record(now, AuditKind::StakeReserved);
        session.phase = SessionPhase::Active;

        let mut opening = None;
        if session.opponent == OpponentKind::Bot
            && rules::to_move(&session.board) == session.opponent_mark()
        {
            opening = self.bot_reply(&mut session, now);
        }

        self.persist_session(&session);
        info!(
            session = request.id,
            account = request.account,
            stake = request.stake,
            pool = ?request.pool,
            "session activated"
        );
        sessions.insert(request.id, Arc::new(Mutex::new(session)));
        Ok(SessionOpened {
            id: request.id,
            opening,
        })
    }

    /// Single MoveSource entry point: local, bot-relayed, or remote movers
    /// all submit through here.
    pub fn submit_move(
        &self,
        session_id: u64,
        mark: Mark,
        cell: u8,
    ) -> Result<MoveOutcome, EngineError> {
        let now = self.clock.now();
        let handle = lock(&self.sessions)
            .get(&session_id)
            .cloned()
            .ok_or(EngineError::SessionNotFound(session_id))?;
        let mut session = lock(&handle);

        if session.phase != SessionPhase::Active {
            return Err(EngineError::SessionNotActive(session_id));
        }
        // The engine owns the bot seat.
        if session.opponent == OpponentKind::Bot && mark == session.opponent_mark() {
            return Err(EngineError::InvalidMove { cell });
        }

        rules::apply_move(&mut session.board, cell, mark)?;
        session.moves.push(MoveRecord { mark, cell, at: now });
        session.last_move_at = now;
        session.record(now, AuditKind::MoveAccepted);

        let mut outcome = rules::detect_outcome(&session.board);
        let mut reply = None;
        if !outcome.is_terminal() && session.opponent == OpponentKind::Bot {
            reply = self.bot_reply(&mut session, now);
            if reply.is_some() {
                outcome = rules::detect_outcome(&session.board);
            }
        }

        let receipt = if outcome.is_terminal() {
            Some(self.finish(&mut session, outcome, now)?)
        } else {
            self.persist_session(&session);
            None
        };

        Ok(MoveOutcome {
            cell,
            mark,
            reply,
            outcome,
            receipt,
        })
    }

    /// Force any session idle past the timeout into a draw-equivalent
    /// refund. Returns the ids that were expired and settled.
    pub fn expire_idle(&self) -> Vec<u64> {
        let now = self.clock.now();
        let handles: Vec<(u64, Arc<Mutex<GameSession>>)> = lock(&self.sessions)
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect();

        let mut expired = Vec::new();
        for (id, handle) in handles {
            let mut session = lock(&handle);
            if session.phase != SessionPhase::Active {
                continue;
            }
            if now.saturating_sub(session.last_move_at) < IDLE_TIMEOUT_SECS {
                continue;
            }

            session.result = SessionResult::Draw;
            session.phase = SessionPhase::Terminal;
            session.record(now, AuditKind::Expired);
            info!(session = id, "idle session expired, refunding stake");

            // Abandoned games never feed the learner.
            match self.ledger.settle(&mut session, now) {
                Ok(_) => expired.push(id),
                Err(e) => {
                    session.record(now, AuditKind::SettlementFailed);
                    warn!(session = id, %e, "expiry settlement failed");
                }
            }
        }
        expired
    }

    /// Retry settlement of a session left `Terminal` by a persistence
    /// failure. Settlement stays exactly-once: an already settled session
    /// fails with `AlreadySettled` and nothing moves.
    pub fn retry_settlement(&self, session_id: u64) -> Result<SettlementReceipt, EngineError> {
        let now = self.clock.now();
        let handle = lock(&self.sessions)
            .get(&session_id)
            .cloned()
            .ok_or(EngineError::SessionNotFound(session_id))?;
        let mut session = lock(&handle);

        let receipt = match self.ledger.settle(&mut session, now) {
            Ok(receipt) => receipt,
            Err(e) => {
                if matches!(e, EngineError::Persistence(_)) {
                    session.record(now, AuditKind::SettlementFailed);
                }
                warn!(session = session_id, %e, "settlement retry failed");
                return Err(e);
            }
        };

        if session.opponent == OpponentKind::Bot {
            if let Err(e) = self.opponent.learn_from_session(
                &session.moves,
                session.result,
                session.opponent_mark(),
                now,
            ) {
                warn!(session = session_id, %e, "dropping bot learning update");
            }
        }
        Ok(receipt)
    }

    /// Snapshot of a session, live or persisted.
    pub fn session(&self, id: u64) -> Result<Option<GameSession>, EngineError> {
        if let Some(handle) = lock(&self.sessions).get(&id).cloned() {
            return Ok(Some(lock(&handle).clone()));
        }
        match gateway::load(self.gateway.as_ref(), &StoreKey::Session(id))? {
            Some(Value::Session(session)) => Ok(Some(session)),
            Some(_) => Err(gateway::corrupt("session")),
            None => Ok(None),
        }
    }

    /// Freeze the board, settle exactly once, then let the bot learn.
    fn finish(
        &self,
        session: &mut GameSession,
        outcome: BoardOutcome,
        now: u64,
    ) -> Result<SettlementReceipt, EngineError> {
        session.result = match outcome {
            BoardOutcome::Won { mark, .. } => SessionResult::Win(mark),
            BoardOutcome::Draw => SessionResult::Draw,
            BoardOutcome::Open => return Err(EngineError::SessionNotTerminal(session.id)),
        };
        session.phase = SessionPhase::Terminal;
        session.record(now, AuditKind::TerminalReached);
        debug!(session = session.id, result = ?session.result, "terminal outcome");

        let receipt = match self.ledger.settle(session, now) {
            Ok(receipt) => receipt,
            Err(e) => {
                session.record(now, AuditKind::SettlementFailed);
                warn!(session = session.id, %e, "settlement failed, session left terminal");
                return Err(e);
            }
        };

        // Learning is best-effort: a failure never rolls back settlement.
        if session.opponent == OpponentKind::Bot {
            if let Err(e) = self.opponent.learn_from_session(
                &session.moves,
                session.result,
                session.opponent_mark(),
                now,
            ) {
                warn!(session = session.id, %e, "dropping bot learning update");
            }
        }

        Ok(receipt)
    }

    /// The bot inspects the board and takes its turn. Returns the cell, or
    /// `None` when no legal move exists (never the case mid-game).
    fn bot_reply(&self, session: &mut GameSession, now: u64) -> Option<u8> {
        let difficulty = session.difficulty.unwrap_or(Difficulty::Medium);
        let mark = session.opponent_mark();
        let cell = {
            let mut rng = lock(&self.rng);
            self.opponent
                .choose_move(&session.board, mark, difficulty, &mut *rng)?
        };
        if let Err(e) = rules::apply_move(&mut session.board, cell, mark) {
            // choose_move only proposes empty cells; a rejection means the
            // turn bookkeeping disagrees with the board.
            warn!(session = session.id, cell, %e, "bot move rejected");
            return None;
        }
        session.moves.push(MoveRecord { mark, cell, at: now });
        session.last_move_at = now;
        session.record(now, AuditKind::MoveAccepted);
        Some(cell)
    }

    /// Mid-game durability is best-effort; the orchestrator's copy is
    /// authoritative while the session lives.
    fn persist_session(&self, session: &GameSession) {
        if let Err(e) = gateway::save(
            self.gateway.as_ref(),
            &StoreKey::Session(session.id),
            &Value::Session(session.clone()),
        ) {
            warn!(session = session.id, %e, "deferring session snapshot");
        }
    }
}

fn validate(request: &SessionRequest) -> Result<(), EngineError> {
    match (request.mode, request.opponent) {
        (GameMode::BotMatch, OpponentKind::Human) => {
            return Err(EngineError::InvalidRequest {
                reason: "bot matches are played against the bot",
            })
        }
        (GameMode::OnlineMatch, OpponentKind::Bot) => {
            return Err(EngineError::InvalidRequest {
                reason: "online matches are played against a human",
            })
        }
        _ => {}
    }
    if request.opponent == OpponentKind::Bot && request.difficulty.is_none() {
        return Err(EngineError::InvalidRequest {
            reason: "bot opponents require a difficulty",
        });
    }
    Ok(())
}
