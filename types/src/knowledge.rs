use std::collections::BTreeMap;

use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, ReadRangeExt, Write};

use crate::board::{BoardKey, Mark};
use crate::codec::read_len;
use crate::constants::{DEFAULT_LEARNING_RATE, KNOWLEDGE_HISTORY_LIMIT, MAX_PATTERN_KEYS};
use crate::session::{MoveRecord, SessionResult};

/// One finished bot game retained for learning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedGame {
    /// Seat the bot held.
    pub bot_mark: Mark,
    pub moves: Vec<MoveRecord>,
    pub result: SessionResult,
    pub at: u64,
}

impl Write for CompletedGame {
    fn write(&self, writer: &mut impl BufMut) {
        self.bot_mark.write(writer);
        self.moves.write(writer);
        self.result.write(writer);
        self.at.write(writer);
    }
}

impl Read for CompletedGame {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            bot_mark: Mark::read(reader)?,
            moves: Vec::<MoveRecord>::read_range(reader, 0..=9)?,
            result: SessionResult::read(reader)?,
            at: u64::read(reader)?,
        })
    }
}

impl EncodeSize for CompletedGame {
    fn encode_size(&self) -> usize {
        self.bot_mark.encode_size()
            + self.moves.encode_size()
            + self.result.encode_size()
            + self.at.encode_size()
    }
}

/// The adaptive opponent's persisted state: a bounded history of completed
/// games and a per-position table of learned move values.
///
/// Values are fixed-point [`crate::constants::VALUE_SCALE`] units. After a
/// bucket is renormalized they lie in [0, VALUE_SCALE]; the degenerate
/// all-equal case is left untouched and may sit outside that range until the
/// next update separates the entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotKnowledge {
    pub game_history: Vec<CompletedGame>,
    pub win_patterns: BTreeMap<BoardKey, BTreeMap<u8, i64>>,
    pub learning_rate: u32,
}

impl BotKnowledge {
    pub fn new() -> Self {
        Self {
            game_history: Vec::new(),
            win_patterns: BTreeMap::new(),
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }

    /// Append a completed game, discarding the oldest past the cap.
    pub fn push_history(&mut self, game: CompletedGame) {
        self.game_history.push(game);
        if self.game_history.len() > KNOWLEDGE_HISTORY_LIMIT {
            let excess = self.game_history.len() - KNOWLEDGE_HISTORY_LIMIT;
            self.game_history.drain(..excess);
        }
    }
}

impl Default for BotKnowledge {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for BotKnowledge {
    fn write(&self, writer: &mut impl BufMut) {
        self.game_history.write(writer);
        (self.win_patterns.len() as u32).write(writer);
        for (key, bucket) in &self.win_patterns {
            key.write(writer);
            (bucket.len() as u32).write(writer);
            for (cell, value) in bucket {
                cell.write(writer);
                value.write(writer);
            }
        }
        self.learning_rate.write(writer);
    }
}

impl Read for BotKnowledge {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let game_history =
            Vec::<CompletedGame>::read_range(reader, 0..=KNOWLEDGE_HISTORY_LIMIT)?;
        let keys = read_len(reader, MAX_PATTERN_KEYS)?;
        let mut win_patterns = BTreeMap::new();
        for _ in 0..keys {
            let key = BoardKey::read(reader)?;
            let cells = read_len(reader, 9)?;
            let mut bucket = BTreeMap::new();
            for _ in 0..cells {
                let cell = u8::read(reader)?;
                let value = i64::read(reader)?;
                bucket.insert(cell, value);
            }
            win_patterns.insert(key, bucket);
        }
        Ok(Self {
            game_history,
            win_patterns,
            learning_rate: u32::read(reader)?,
        })
    }
}

impl EncodeSize for BotKnowledge {
    fn encode_size(&self) -> usize {
        let patterns: usize = self
            .win_patterns
            .values()
            .map(|bucket| BoardKey::SIZE + 4 + bucket.len() * (u8::SIZE + i64::SIZE))
            .sum();
        self.game_history.encode_size() + 4 + patterns + self.learning_rate.encode_size()
    }
}
