use bytes::{Buf, BufMut};
use commonware_codec::{Error, FixedSize, Read, ReadExt, Write};

/// Player marks. X always moves first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Mark {
    X = 0,
    O = 1,
}

impl Mark {
    /// The opposing mark.
    pub fn opponent(self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }

    /// ASCII byte used in persisted board keys.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::X => b'X',
            Self::O => b'O',
        }
    }
}

impl Write for Mark {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for Mark {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::X),
            1 => Ok(Self::O),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for Mark {
    const SIZE: usize = 1;
}

/// The 8 canonical winning lines: 3 rows, 3 columns, 2 diagonals.
pub const LINES: [[u8; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// A 3x3 board in row-major order.
///
/// The board itself carries no legality rules; validated play goes through
/// the execution crate's rules module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Board {
    cells: [Option<Mark>; 9],
}

impl Board {
    /// An empty board.
    pub fn new() -> Self {
        Self { cells: [None; 9] }
    }

    /// Mark at `cell`, if any. Out-of-range cells read as empty.
    pub fn get(&self, cell: u8) -> Option<Mark> {
        self.cells.get(cell as usize).copied().flatten()
    }

    /// Place `mark` at `cell` without legality checks.
    pub fn set(&mut self, cell: u8, mark: Mark) {
        if let Some(slot) = self.cells.get_mut(cell as usize) {
            *slot = Some(mark);
        }
    }

    /// Number of cells occupied by `mark`.
    pub fn count(&self, mark: Mark) -> u8 {
        self.cells.iter().filter(|c| **c == Some(mark)).count() as u8
    }

    /// True when all nine cells are occupied.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|c| c.is_some())
    }

    /// Indices of the unoccupied cells, ascending.
    pub fn empty_cells(&self) -> Vec<u8> {
        (0..9).filter(|c| self.get(*c).is_none()).collect()
    }

    /// Persisted lookup key for this position with `mover` to play.
    pub fn key(&self, mover: Mark) -> BoardKey {
        let mut key = [b'-'; 10];
        for (i, cell) in self.cells.iter().enumerate() {
            if let Some(mark) = cell {
                key[i] = mark.as_byte();
            }
        }
        key[9] = mover.as_byte();
        BoardKey(key)
    }
}

impl Write for Board {
    fn write(&self, writer: &mut impl BufMut) {
        for cell in &self.cells {
            let byte = match cell {
                None => 0u8,
                Some(Mark::X) => 1,
                Some(Mark::O) => 2,
            };
            byte.write(writer);
        }
    }
}

impl Read for Board {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let mut cells = [None; 9];
        for cell in &mut cells {
            *cell = match u8::read(reader)? {
                0 => None,
                1 => Some(Mark::X),
                2 => Some(Mark::O),
                i => return Err(Error::InvalidEnum(i)),
            };
        }
        Ok(Self { cells })
    }
}

impl FixedSize for Board {
    const SIZE: usize = 9;
}

/// Key into the bot's learned value table: nine cell bytes (`X`/`O`/`-`)
/// followed by the mover byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoardKey([u8; 10]);

impl BoardKey {
    pub fn as_bytes(&self) -> &[u8; 10] {
        &self.0
    }
}

impl Write for BoardKey {
    fn write(&self, writer: &mut impl BufMut) {
        writer.put_slice(&self.0);
    }
}

impl Read for BoardKey {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        if reader.remaining() < 10 {
            return Err(Error::EndOfBuffer);
        }
        let mut key = [0u8; 10];
        reader.copy_to_slice(&mut key);
        Ok(Self(key))
    }
}

impl FixedSize for BoardKey {
    const SIZE: usize = 10;
}
