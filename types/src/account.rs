use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, FixedSize, Read, ReadExt, Write};

use crate::codec::{read_string, string_encode_size, write_string};
use crate::constants::MAX_NAME_LENGTH;

/// Balance pools. Practice is play-money; Real is withdrawable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Pool {
    Practice = 0,
    Real = 1,
}

impl Write for Pool {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for Pool {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Practice),
            1 => Ok(Self::Real),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for Pool {
    const SIZE: usize = 1;
}

/// Per-user account state. Mutated only by the stake ledger.
///
/// Balances are u64 minor units, so non-negativity holds by construction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    pub id: u64,
    pub name: String,
    pub practice_balance: u64,
    pub real_balance: u64,
    pub games_played: u64,
    pub games_won: u64,
    pub commission_paid: u64,
    pub created_at: u64,
}

impl Account {
    pub fn new(id: u64, name: String, created_at: u64) -> Self {
        Self {
            id,
            name,
            created_at,
            ..Self::default()
        }
    }

    /// Balance of the given pool.
    pub fn balance(&self, pool: Pool) -> u64 {
        match pool {
            Pool::Practice => self.practice_balance,
            Pool::Real => self.real_balance,
        }
    }

    /// Mutable balance of the given pool.
    pub fn balance_mut(&mut self, pool: Pool) -> &mut u64 {
        match pool {
            Pool::Practice => &mut self.practice_balance,
            Pool::Real => &mut self.real_balance,
        }
    }
}

impl Write for Account {
    fn write(&self, writer: &mut impl BufMut) {
        self.id.write(writer);
        write_string(&self.name, writer);
        self.practice_balance.write(writer);
        self.real_balance.write(writer);
        self.games_played.write(writer);
        self.games_won.write(writer);
        self.commission_paid.write(writer);
        self.created_at.write(writer);
    }
}

impl Read for Account {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            id: u64::read(reader)?,
            name: read_string(reader, MAX_NAME_LENGTH)?,
            practice_balance: u64::read(reader)?,
            real_balance: u64::read(reader)?,
            games_played: u64::read(reader)?,
            games_won: u64::read(reader)?,
            commission_paid: u64::read(reader)?,
            created_at: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Account {
    fn encode_size(&self) -> usize {
        self.id.encode_size()
            + string_encode_size(&self.name)
            + self.practice_balance.encode_size()
            + self.real_balance.encode_size()
            + self.games_played.encode_size()
            + self.games_won.encode_size()
            + self.commission_paid.encode_size()
            + self.created_at.encode_size()
    }
}

/// Why a ledger entry was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryReason {
    /// Stake debited at session start.
    Reserve = 0,
    /// Stake returned on a draw or expired session.
    Refund = 1,
    /// Net winnings credited on a win.
    Payout = 2,
    /// Operator-initiated seizure; unused by the normal settlement paths,
    /// where a loss leaves the reserve debit as the final word.
    Forfeit = 3,
    /// External credit: payment-processor callback or registration grant.
    Deposit = 4,
}

impl Write for EntryReason {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for EntryReason {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Reserve),
            1 => Ok(Self::Refund),
            2 => Ok(Self::Payout),
            3 => Ok(Self::Forfeit),
            4 => Ok(Self::Deposit),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for EntryReason {
    const SIZE: usize = 1;
}

/// Immutable, append-only record of one balance mutation.
///
/// For each (account, pool) the balance equals the sum of entry deltas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEntry {
    pub account: u64,
    pub pool: Pool,
    pub delta: i64,
    pub reason: EntryReason,
    /// Session the entry settles, absent for deposits.
    pub session: Option<u64>,
    pub at: u64,
}

impl Write for LedgerEntry {
    fn write(&self, writer: &mut impl BufMut) {
        self.account.write(writer);
        self.pool.write(writer);
        self.delta.write(writer);
        self.reason.write(writer);
        self.session.write(writer);
        self.at.write(writer);
    }
}

impl Read for LedgerEntry {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            account: u64::read(reader)?,
            pool: Pool::read(reader)?,
            delta: i64::read(reader)?,
            reason: EntryReason::read(reader)?,
            session: Option::<u64>::read(reader)?,
            at: u64::read(reader)?,
        })
    }
}

impl EncodeSize for LedgerEntry {
    fn encode_size(&self) -> usize {
        self.account.encode_size()
            + self.pool.encode_size()
            + self.delta.encode_size()
            + self.reason.encode_size()
            + self.session.encode_size()
            + self.at.encode_size()
    }
}
