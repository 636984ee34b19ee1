use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, ReadRangeExt, Write};

use crate::account::Pool;
use crate::board::{Board, Mark};
use crate::constants::MAX_AUDIT_ENTRIES;

/// How a session was arranged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum GameMode {
    Practice = 0,
    BotMatch = 1,
    OnlineMatch = 2,
}

impl Write for GameMode {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for GameMode {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Practice),
            1 => Ok(Self::BotMatch),
            2 => Ok(Self::OnlineMatch),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for GameMode {
    const SIZE: usize = 1;
}

/// Who sits across the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OpponentKind {
    Bot = 0,
    Human = 1,
}

impl Write for OpponentKind {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for OpponentKind {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Bot),
            1 => Ok(Self::Human),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for OpponentKind {
    const SIZE: usize = 1;
}

/// Bot strength for the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Difficulty {
    Easy = 0,
    Medium = 1,
    Hard = 2,
}

impl Write for Difficulty {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for Difficulty {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Easy),
            1 => Ok(Self::Medium),
            2 => Ok(Self::Hard),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for Difficulty {
    const SIZE: usize = 1;
}

/// Session lifecycle. Settlement happens exactly once, on the
/// `Terminal -> Settled` edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionPhase {
    /// Session object exists; no funds moved.
    Created = 0,
    /// Stake debited from the chosen pool.
    StakeReserved = 1,
    /// Accepting moves.
    Active = 2,
    /// Outcome known; board frozen; not yet settled.
    Terminal = 3,
    /// Ledger finalized. The record is immutable apart from the audit trail.
    Settled = 4,
}

impl Write for SessionPhase {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for SessionPhase {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Created),
            1 => Ok(Self::StakeReserved),
            2 => Ok(Self::Active),
            3 => Ok(Self::Terminal),
            4 => Ok(Self::Settled),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for SessionPhase {
    const SIZE: usize = 1;
}

/// Final outcome of a session's board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionResult {
    Unset,
    Win(Mark),
    Draw,
}

impl Write for SessionResult {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Unset => 0u8.write(writer),
            Self::Win(mark) => {
                1u8.write(writer);
                mark.write(writer);
            }
            Self::Draw => 2u8.write(writer),
        }
    }
}

impl Read for SessionResult {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Unset),
            1 => Ok(Self::Win(Mark::read(reader)?)),
            2 => Ok(Self::Draw),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl EncodeSize for SessionResult {
    fn encode_size(&self) -> usize {
        match self {
            Self::Win(_) => 2,
            _ => 1,
        }
    }
}

/// One accepted move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveRecord {
    pub mark: Mark,
    pub cell: u8,
    pub at: u64,
}

impl Write for MoveRecord {
    fn write(&self, writer: &mut impl BufMut) {
        self.mark.write(writer);
        self.cell.write(writer);
        self.at.write(writer);
    }
}

impl Read for MoveRecord {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            mark: Mark::read(reader)?,
            cell: u8::read(reader)?,
            at: u64::read(reader)?,
        })
    }
}

impl FixedSize for MoveRecord {
    const SIZE: usize = Mark::SIZE + u8::SIZE + u64::SIZE;
}

/// Lifecycle events recorded on the session's append-only audit trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AuditKind {
    Created = 0,
    StakeReserved = 1,
    MoveAccepted = 2,
    TerminalReached = 3,
    Settled = 4,
    SettlementFailed = 5,
    Expired = 6,
}

impl Write for AuditKind {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for AuditKind {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Created),
            1 => Ok(Self::StakeReserved),
            2 => Ok(Self::MoveAccepted),
            3 => Ok(Self::TerminalReached),
            4 => Ok(Self::Settled),
            5 => Ok(Self::SettlementFailed),
            6 => Ok(Self::Expired),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for AuditKind {
    const SIZE: usize = 1;
}

/// Timestamped audit event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    pub at: u64,
    pub kind: AuditKind,
}

impl Write for AuditEntry {
    fn write(&self, writer: &mut impl BufMut) {
        self.at.write(writer);
        self.kind.write(writer);
    }
}

impl Read for AuditEntry {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            at: u64::read(reader)?,
            kind: AuditKind::read(reader)?,
        })
    }
}

impl FixedSize for AuditEntry {
    const SIZE: usize = u64::SIZE + AuditKind::SIZE;
}

/// A wagered game from stake reservation through settlement.
///
/// Owned exclusively by the session orchestrator for its lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameSession {
    pub id: u64,
    pub account: u64,
    pub mode: GameMode,
    pub pool: Pool,
    pub stake: u64,
    pub opponent: OpponentKind,
    pub difficulty: Option<Difficulty>,
    /// Mark held by the staking player; the opponent holds the other seat.
    pub player_mark: Mark,
    pub board: Board,
    pub moves: Vec<MoveRecord>,
    pub phase: SessionPhase,
    pub result: SessionResult,
    pub created_at: u64,
    pub last_move_at: u64,
    pub settled_at: Option<u64>,
    pub audit: Vec<AuditEntry>,
}

impl GameSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        account: u64,
        mode: GameMode,
        pool: Pool,
        stake: u64,
        opponent: OpponentKind,
        difficulty: Option<Difficulty>,
        player_mark: Mark,
        now: u64,
    ) -> Self {
        let mut session = Self {
            id,
            account,
            mode,
            pool,
            stake,
            opponent,
            difficulty,
            player_mark,
            board: Board::new(),
            moves: Vec::new(),
            phase: SessionPhase::Created,
            result: SessionResult::Unset,
            created_at: now,
            last_move_at: now,
            settled_at: None,
            audit: Vec::new(),
        };
        session.record(now, AuditKind::Created);
        session
    }

    /// Mark held by the opponent seat.
    pub fn opponent_mark(&self) -> Mark {
        self.player_mark.opponent()
    }

    /// Append an audit event. The trail is bounded so the persisted record
    /// cannot grow without limit.
    pub fn record(&mut self, at: u64, kind: AuditKind) {
        if self.audit.len() < MAX_AUDIT_ENTRIES {
            self.audit.push(AuditEntry { at, kind });
        }
    }
}

impl Write for GameSession {
    fn write(&self, writer: &mut impl BufMut) {
        self.id.write(writer);
        self.account.write(writer);
        self.mode.write(writer);
        self.pool.write(writer);
        self.stake.write(writer);
        self.opponent.write(writer);
        self.difficulty.write(writer);
        self.player_mark.write(writer);
        self.board.write(writer);
        self.moves.write(writer);
        self.phase.write(writer);
        self.result.write(writer);
        self.created_at.write(writer);
        self.last_move_at.write(writer);
        self.settled_at.write(writer);
        self.audit.write(writer);
    }
}

impl Read for GameSession {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: u64::read(reader)?,
            account: u64::read(reader)?,
            mode: GameMode::read(reader)?,
            pool: Pool::read(reader)?,
            stake: u64::read(reader)?,
            opponent: OpponentKind::read(reader)?,
            difficulty: Option::<Difficulty>::read(reader)?,
            player_mark: Mark::read(reader)?,
            board: Board::read(reader)?,
            moves: Vec::<MoveRecord>::read_range(reader, 0..=9)?,
            phase: SessionPhase::read(reader)?,
            result: SessionResult::read(reader)?,
            created_at: u64::read(reader)?,
            last_move_at: u64::read(reader)?,
            settled_at: Option::<u64>::read(reader)?,
            audit: Vec::<AuditEntry>::read_range(reader, 0..=MAX_AUDIT_ENTRIES)?,
        })
    }
}

impl EncodeSize for GameSession {
    fn encode_size(&self) -> usize {
        self.id.encode_size()
            + self.account.encode_size()
            + self.mode.encode_size()
            + self.pool.encode_size()
            + self.stake.encode_size()
            + self.opponent.encode_size()
            + self.difficulty.encode_size()
            + self.player_mark.encode_size()
            + self.board.encode_size()
            + self.moves.encode_size()
            + self.phase.encode_size()
            + self.result.encode_size()
            + self.created_at.encode_size()
            + self.last_move_at.encode_size()
            + self.settled_at.encode_size()
            + self.audit.encode_size()
    }
}
