use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, ReadRangeExt, Write};

use crate::account::{Account, LedgerEntry};
use crate::commission::{CommissionFund, CommissionRecord};
use crate::constants::{MAX_COMMISSION_RECORDS, MAX_LEDGER_ENTRIES};
use crate::knowledge::BotKnowledge;
use crate::session::GameSession;

/// Version byte prefixed to every encoded [`Value`]. Bump when a record
/// format changes incompatibly; readers reject versions they do not know.
pub const SCHEMA_VERSION: u8 = 1;

/// Logical names for the collections held behind the persistence gateway.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKey {
    Account(u64),
    Ledger(u64),
    Session(u64),
    CommissionFund,
    CommissionHistory,
    Knowledge,
}

impl Write for StoreKey {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Account(id) => {
                0u8.write(writer);
                id.write(writer);
            }
            Self::Ledger(id) => {
                1u8.write(writer);
                id.write(writer);
            }
            Self::Session(id) => {
                2u8.write(writer);
                id.write(writer);
            }
            Self::CommissionFund => 3u8.write(writer),
            Self::CommissionHistory => 4u8.write(writer),
            Self::Knowledge => 5u8.write(writer),
        }
    }
}

impl Read for StoreKey {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(Self::Account(u64::read(reader)?)),
            1 => Ok(Self::Ledger(u64::read(reader)?)),
            2 => Ok(Self::Session(u64::read(reader)?)),
            3 => Ok(Self::CommissionFund),
            4 => Ok(Self::CommissionHistory),
            5 => Ok(Self::Knowledge),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl EncodeSize for StoreKey {
    fn encode_size(&self) -> usize {
        1 + match self {
            Self::Account(id) | Self::Ledger(id) | Self::Session(id) => id.encode_size(),
            _ => 0,
        }
    }
}

/// Tagged, versioned envelope for every persisted record.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Value {
    Account(Account),
    Ledger(Vec<LedgerEntry>),
    Session(GameSession),
    CommissionFund(CommissionFund),
    CommissionHistory(Vec<CommissionRecord>),
    Knowledge(BotKnowledge),
}

impl Write for Value {
    fn write(&self, writer: &mut impl BufMut) {
        SCHEMA_VERSION.write(writer);
        match self {
            Self::Account(account) => {
                0u8.write(writer);
                account.write(writer);
            }
            Self::Ledger(entries) => {
                1u8.write(writer);
                entries.write(writer);
            }
            Self::Session(session) => {
                2u8.write(writer);
                session.write(writer);
            }
            Self::CommissionFund(fund) => {
                3u8.write(writer);
                fund.write(writer);
            }
            Self::CommissionHistory(records) => {
                4u8.write(writer);
                records.write(writer);
            }
            Self::Knowledge(knowledge) => {
                5u8.write(writer);
                knowledge.write(writer);
            }
        }
    }
}

impl Read for Value {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let version = u8::read(reader)?;
        if version != SCHEMA_VERSION {
            return Err(Error::Invalid("Value", "unsupported schema version"));
        }
        match u8::read(reader)? {
            0 => Ok(Self::Account(Account::read(reader)?)),
            1 => Ok(Self::Ledger(Vec::<LedgerEntry>::read_range(
                reader,
                0..=MAX_LEDGER_ENTRIES,
            )?)),
            2 => Ok(Self::Session(GameSession::read(reader)?)),
            3 => Ok(Self::CommissionFund(CommissionFund::read(reader)?)),
            4 => Ok(Self::CommissionHistory(Vec::<CommissionRecord>::read_range(
                reader,
                0..=MAX_COMMISSION_RECORDS,
            )?)),
            5 => Ok(Self::Knowledge(BotKnowledge::read(reader)?)),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl EncodeSize for Value {
    fn encode_size(&self) -> usize {
        2 + match self {
            Self::Account(account) => account.encode_size(),
            Self::Ledger(entries) => entries.encode_size(),
            Self::Session(session) => session.encode_size(),
            Self::CommissionFund(fund) => fund.encode_size(),
            Self::CommissionHistory(records) => records.encode_size(),
            Self::Knowledge(knowledge) => knowledge.encode_size(),
        }
    }
}
