/// Maximum account name length.
pub const MAX_NAME_LENGTH: usize = 32;

/// Commission rate in basis points applied to qualifying payouts (5%).
pub const COMMISSION_RATE_BPS: u64 = 500;

/// Basis-point denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Smallest stake the ledger will reserve.
pub const MIN_STAKE: u64 = 1;

/// Practice-pool balance granted when an account is registered.
pub const STARTING_PRACTICE_BALANCE: u64 = 1_000;

/// Completed games the adaptive opponent retains for learning.
pub const KNOWLEDGE_HISTORY_LIMIT: usize = 1_000;

/// Fixed-point scale for learned move values (1.0 == 1_000_000).
pub const VALUE_SCALE: i64 = 1_000_000;

/// Default learning rate in [`VALUE_SCALE`] units (0.1).
pub const DEFAULT_LEARNING_RATE: u32 = 100_000;

/// Seconds an active session may sit without a move before it is expired
/// with a full refund.
pub const IDLE_TIMEOUT_SECS: u64 = 600;

/// Seconds per day, used by the commission fund window rollover.
pub const SECS_PER_DAY: u64 = 86_400;

/// Decode bound for a single account's ledger entries.
pub const MAX_LEDGER_ENTRIES: usize = 100_000;

/// Decode bound for the global commission history.
pub const MAX_COMMISSION_RECORDS: usize = 100_000;

/// Decode bound for learned board positions. There are at most 3^9 * 2
/// reachable (board, mover) keys, so this is never limiting in practice.
pub const MAX_PATTERN_KEYS: usize = 50_000;

/// Audit entries retained per session.
pub const MAX_AUDIT_ENTRIES: usize = 64;
