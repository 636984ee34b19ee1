use commonware_codec::{Encode, ReadExt};

use crate::account::{Account, EntryReason, LedgerEntry, Pool};
use crate::board::{Board, Mark};
use crate::commission::CommissionFund;
use crate::constants::{KNOWLEDGE_HISTORY_LIMIT, SECS_PER_DAY};
use crate::knowledge::{BotKnowledge, CompletedGame};
use crate::session::{
    AuditKind, Difficulty, GameMode, GameSession, MoveRecord, OpponentKind, SessionPhase,
    SessionResult,
};
use crate::store::{StoreKey, Value, SCHEMA_VERSION};

fn sample_session() -> GameSession {
    let mut session = GameSession::new(
        7,
        42,
        GameMode::BotMatch,
        Pool::Practice,
        50,
        OpponentKind::Bot,
        Some(Difficulty::Hard),
        Mark::X,
        1_000,
    );
    session.phase = SessionPhase::Active;
    session.board.set(0, Mark::X);
    session.board.set(4, Mark::O);
    session.moves.push(MoveRecord {
        mark: Mark::X,
        cell: 0,
        at: 1_001,
    });
    session.moves.push(MoveRecord {
        mark: Mark::O,
        cell: 4,
        at: 1_002,
    });
    session.record(1_002, AuditKind::MoveAccepted);
    session
}

#[test]
fn test_board_key_layout() {
    let mut board = Board::new();
    board.set(0, Mark::X);
    board.set(4, Mark::O);
    board.set(8, Mark::X);

    let key = board.key(Mark::O);
    assert_eq!(key.as_bytes(), b"X---O---XO");
}

#[test]
fn test_board_roundtrip() {
    let mut board = Board::new();
    board.set(2, Mark::O);
    board.set(6, Mark::X);

    let encoded = board.encode();
    let decoded = Board::read(&mut &encoded[..]).expect("board decode failed");
    assert_eq!(board, decoded);
}

#[test]
fn test_session_roundtrip() {
    let session = sample_session();
    let encoded = session.encode();
    let decoded = GameSession::read(&mut &encoded[..]).expect("session decode failed");
    assert_eq!(session, decoded);
}

#[test]
fn test_value_envelope_roundtrip() {
    let mut account = Account::new(42, "Grace".to_string(), 500);
    account.practice_balance = 1_000;
    account.real_balance = 250;

    let entries = vec![LedgerEntry {
        account: 42,
        pool: Pool::Real,
        delta: -100,
        reason: EntryReason::Reserve,
        session: Some(7),
        at: 1_000,
    }];

    for value in [
        Value::Account(account),
        Value::Ledger(entries),
        Value::Session(sample_session()),
        Value::CommissionFund(CommissionFund::new(1_000)),
        Value::Knowledge(BotKnowledge::new()),
    ] {
        let encoded = value.encode();
        let decoded = Value::read(&mut &encoded[..]).expect("value decode failed");
        assert_eq!(value, decoded);
    }
}

#[test]
fn test_value_rejects_unknown_schema_version() {
    let value = Value::CommissionFund(CommissionFund::new(1_000));
    let mut encoded = value.encode().to_vec();
    assert_eq!(encoded[0], SCHEMA_VERSION);

    encoded[0] = SCHEMA_VERSION + 1;
    assert!(Value::read(&mut &encoded[..]).is_err());
}

#[test]
fn test_store_key_roundtrip() {
    for key in [
        StoreKey::Account(1),
        StoreKey::Ledger(2),
        StoreKey::Session(3),
        StoreKey::CommissionFund,
        StoreKey::CommissionHistory,
        StoreKey::Knowledge,
    ] {
        let encoded = key.encode();
        let decoded = StoreKey::read(&mut &encoded[..]).expect("key decode failed");
        assert_eq!(key, decoded);
    }
}

#[test]
fn test_knowledge_roundtrip_with_patterns() {
    let mut knowledge = BotKnowledge::new();
    let mut board = Board::new();
    board.set(0, Mark::X);

    let bucket = knowledge.win_patterns.entry(board.key(Mark::O)).or_default();
    bucket.insert(4, 1_000_000);
    bucket.insert(8, 0);

    knowledge.push_history(CompletedGame {
        bot_mark: Mark::O,
        moves: vec![MoveRecord {
            mark: Mark::X,
            cell: 0,
            at: 1,
        }],
        result: SessionResult::Win(Mark::X),
        at: 2,
    });

    let encoded = knowledge.encode();
    let decoded = BotKnowledge::read(&mut &encoded[..]).expect("knowledge decode failed");
    assert_eq!(knowledge, decoded);
}

#[test]
fn test_history_cap_discards_oldest() {
    let mut knowledge = BotKnowledge::new();
    for i in 0..(KNOWLEDGE_HISTORY_LIMIT + 10) {
        knowledge.push_history(CompletedGame {
            bot_mark: Mark::O,
            moves: Vec::new(),
            result: SessionResult::Draw,
            at: i as u64,
        });
    }

    assert_eq!(knowledge.game_history.len(), KNOWLEDGE_HISTORY_LIMIT);
    // The ten oldest games are gone.
    assert_eq!(knowledge.game_history[0].at, 10);
}

#[test]
fn test_fund_rollover() {
    let start = 100 * SECS_PER_DAY;
    let mut fund = CommissionFund::new(start);
    fund.accrue(40, start);
    assert_eq!(fund.total, 40);
    assert_eq!(fund.daily, 40);

    // Next day: daily resets, weekly/monthly survive.
    fund.accrue(10, start + SECS_PER_DAY);
    assert_eq!(fund.total, 50);
    assert_eq!(fund.daily, 10);
    assert_eq!(fund.weekly, 50);
    assert_eq!(fund.monthly, 50);

    // A week later: weekly resets too.
    fund.accrue(5, start + 8 * SECS_PER_DAY);
    assert_eq!(fund.daily, 5);
    assert_eq!(fund.weekly, 5);
    assert_eq!(fund.monthly, 55);

    // A month later: everything but the total resets.
    fund.accrue(1, start + 40 * SECS_PER_DAY);
    assert_eq!(fund.total, 56);
    assert_eq!(fund.daily, 1);
    assert_eq!(fund.weekly, 1);
    assert_eq!(fund.monthly, 1);
}

#[test]
fn test_audit_trail_is_bounded() {
    let mut session = sample_session();
    for i in 0..200 {
        session.record(i, AuditKind::MoveAccepted);
    }
    assert!(session.audit.len() <= crate::constants::MAX_AUDIT_ENTRIES);
}
