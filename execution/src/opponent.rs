//! The adaptive opponent: three difficulty tiers over one persisted value
//! table.
//!
//! Easy picks uniformly at random. Medium runs the classic ordered
//! heuristic (win, block, center, corner, random). Hard consults the
//! learned table and falls back to Medium whenever the table has nothing
//! usable. Learning replays completed games and nudges the value of each
//! bot move up or down, renormalizing the touched position to the
//! fixed-point [0, VALUE_SCALE] range.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use gridstake_types::board::{Board, Mark};
use gridstake_types::constants::VALUE_SCALE;
use gridstake_types::knowledge::{BotKnowledge, CompletedGame};
use gridstake_types::session::{Difficulty, MoveRecord, SessionResult};
use gridstake_types::store::{StoreKey, Value};
use rand::Rng;
use tracing::{debug, warn};

use crate::gateway::{self, PersistenceGateway};
use crate::{lock, rules, EngineError};

/// Aggregates over the opponent's retained history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpponentStats {
    pub games: usize,
    pub wins: usize,
    pub losses: usize,
    pub draws: usize,
    /// Distinct board positions with learned values.
    pub patterns: usize,
}

/// Bot move selection and cross-session learning.
///
/// Knowledge is loaded from the gateway on first use and flushed after every
/// learning pass. There is no ambient global: each engine owns its instance.
pub struct AdaptiveOpponent<G: PersistenceGateway> {
    gateway: Arc<G>,
    knowledge: Mutex<Option<BotKnowledge>>,
}

impl<G: PersistenceGateway> AdaptiveOpponent<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            knowledge: Mutex::new(None),
        }
    }

    /// Pick a cell for `mark` at the given difficulty. Returns `None` only
    /// when the board has no empty cell.
    pub fn choose_move<R: Rng>(
        &self,
        board: &Board,
        mark: Mark,
        difficulty: Difficulty,
        rng: &mut R,
    ) -> Option<u8> {
        let empty = board.empty_cells();
        if empty.is_empty() {
            return None;
        }
        let cell = match difficulty {
            Difficulty::Easy => easy_move(&empty, rng),
            Difficulty::Medium => medium_move(board, mark, &empty, rng),
            Difficulty::Hard => self.hard_move(board, mark, &empty, rng),
        };
        Some(cell)
    }

    fn hard_move<R: Rng>(&self, board: &Board, mark: Mark, empty: &[u8], rng: &mut R) -> u8 {
        let key = board.key(mark);
        let learned = self.with_knowledge(|knowledge| {
            knowledge
                .win_patterns
                .get(&key)
                .and_then(|bucket| best_cell(bucket))
        });
        match learned {
            // Never trust a stale suggestion: the cell must still be empty.
            Ok(Some(cell)) if empty.contains(&cell) => cell,
            Ok(_) => medium_move(board, mark, empty, rng),
            Err(e) => {
                warn!(%e, "knowledge unavailable, using heuristic move");
                medium_move(board, mark, empty, rng)
            }
        }
    }

    /// Fold a completed session into the value table.
    ///
    /// Every move made by `bot_mark` is rewarded with `+learning_rate` when
    /// the bot won and `-learning_rate` when it lost; draws update no values
    /// but still enter the capped history. The touched bucket is min-max
    /// renormalized after each update.
    pub fn learn_from_session(
        &self,
        moves: &[MoveRecord],
        result: SessionResult,
        bot_mark: Mark,
        now: u64,
    ) -> Result<(), EngineError> {
        let snapshot = self.with_knowledge(|knowledge| {
            let delta = match result {
                SessionResult::Win(mark) if mark == bot_mark => {
                    Some(knowledge.learning_rate as i64)
                }
                SessionResult::Win(_) => Some(-(knowledge.learning_rate as i64)),
                // Draws carry no reward signal.
                SessionResult::Draw => None,
                SessionResult::Unset => None,
            };

            if let Some(delta) = delta {
                let mut board = Board::new();
                for record in moves {
                    if record.mark == bot_mark {
                        let key = board.key(bot_mark);
                        let bucket = knowledge.win_patterns.entry(key).or_default();
                        *bucket.entry(record.cell).or_insert(0) += delta;
                        normalize(bucket);
                    }
                    board.set(record.cell, record.mark);
                }
            }

            knowledge.push_history(CompletedGame {
                bot_mark,
                moves: moves.to_vec(),
                result,
                at: now,
            });
            knowledge.clone()
        })?;

        self.flush(snapshot)
    }

    /// Aggregate statistics over the retained history.
    pub fn stats(&self) -> Result<OpponentStats, EngineError> {
        self.with_knowledge(|knowledge| {
            let mut stats = OpponentStats {
                games: knowledge.game_history.len(),
                patterns: knowledge.win_patterns.len(),
                ..OpponentStats::default()
            };
            for game in &knowledge.game_history {
                match game.result {
                    SessionResult::Win(mark) if mark == game.bot_mark => stats.wins += 1,
                    SessionResult::Win(_) => stats.losses += 1,
                    SessionResult::Draw => stats.draws += 1,
                    SessionResult::Unset => {}
                }
            }
            stats
        })
    }

    /// Discard all learned state.
    pub fn reset_learning(&self) -> Result<(), EngineError> {
        let snapshot = self.with_knowledge(|knowledge| {
            *knowledge = BotKnowledge::new();
            knowledge.clone()
        })?;
        self.flush(snapshot)
    }

    /// Run `f` against the lazily loaded knowledge. A gateway failure leaves
    /// the slot unloaded so a later call can retry the load.
    fn with_knowledge<T>(&self, f: impl FnOnce(&mut BotKnowledge) -> T) -> Result<T, EngineError> {
        let mut slot = lock(&self.knowledge);
        let knowledge = match slot.as_mut() {
            Some(knowledge) => knowledge,
            None => {
                let loaded = match gateway::load(self.gateway.as_ref(), &StoreKey::Knowledge)? {
                    Some(Value::Knowledge(knowledge)) => knowledge,
                    Some(_) => return Err(gateway::corrupt("knowledge")),
                    None => {
                        debug!("no persisted knowledge, starting fresh");
                        BotKnowledge::new()
                    }
                };
                slot.insert(loaded)
            }
        };
        Ok(f(knowledge))
    }

    fn flush(&self, snapshot: BotKnowledge) -> Result<(), EngineError> {
        gateway::save(
            self.gateway.as_ref(),
            &StoreKey::Knowledge,
            &Value::Knowledge(snapshot),
        )
    }
}

fn easy_move<R: Rng>(empty: &[u8], rng: &mut R) -> u8 {
    empty[rng.gen_range(0..empty.len())]
}

/// Ordered heuristic: complete own line, block the opponent's, take the
/// center, take a random free corner, else any random empty cell.
fn medium_move<R: Rng>(board: &Board, mark: Mark, empty: &[u8], rng: &mut R) -> u8 {
    if let Some(cell) = rules::completing_cell(board, mark) {
        return cell;
    }
    if let Some(cell) = rules::completing_cell(board, mark.opponent()) {
        return cell;
    }
    if board.get(4).is_none() {
        return 4;
    }
    let corners: Vec<u8> = [0u8, 2, 6, 8]
        .into_iter()
        .filter(|c| board.get(*c).is_none())
        .collect();
    if !corners.is_empty() {
        return corners[rng.gen_range(0..corners.len())];
    }
    empty[rng.gen_range(0..empty.len())]
}

/// Highest-valued cell in a bucket; ties break to the lowest index.
fn best_cell(bucket: &BTreeMap<u8, i64>) -> Option<u8> {
    let mut best: Option<(u8, i64)> = None;
    for (cell, value) in bucket {
        match best {
            Some((_, best_value)) if *value <= best_value => {}
            _ => best = Some((*cell, *value)),
        }
    }
    best.map(|(cell, _)| cell)
}

/// Min-max rescale a bucket to [0, VALUE_SCALE]. When every value is equal
/// (including the single-entry case) the bucket is left unchanged.
fn normalize(bucket: &mut BTreeMap<u8, i64>) {
    let Some(max) = bucket.values().copied().max() else {
        return;
    };
    let Some(min) = bucket.values().copied().min() else {
        return;
    };
    if max == min {
        return;
    }
    let range = max - min;
    for value in bucket.values_mut() {
        *value = (*value - min) * VALUE_SCALE / range;
    }
}
