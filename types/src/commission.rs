use bytes::{Buf, BufMut};
use commonware_codec::{Error, FixedSize, Read, ReadExt, Write};

use crate::constants::SECS_PER_DAY;

/// One commission accrual. Written at most once per settled session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommissionRecord {
    pub session: u64,
    pub account: u64,
    pub stake: u64,
    pub amount: u64,
    pub accrued_at: u64,
}

impl Write for CommissionRecord {
    fn write(&self, writer: &mut impl BufMut) {
        self.session.write(writer);
        self.account.write(writer);
        self.stake.write(writer);
        self.amount.write(writer);
        self.accrued_at.write(writer);
    }
}

impl Read for CommissionRecord {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            session: u64::read(reader)?,
            account: u64::read(reader)?,
            stake: u64::read(reader)?,
            amount: u64::read(reader)?,
            accrued_at: u64::read(reader)?,
        })
    }
}

impl FixedSize for CommissionRecord {
    const SIZE: usize = 5 * u64::SIZE;
}

/// Rolling commission aggregates.
///
/// The daily/weekly/monthly windows reset lazily: the next accrual after a
/// window boundary zeroes the window before adding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommissionFund {
    pub total: u64,
    pub daily: u64,
    pub weekly: u64,
    pub monthly: u64,
    pub last_reset: u64,
}

impl CommissionFund {
    pub fn new(now: u64) -> Self {
        Self {
            last_reset: now,
            ..Self::default()
        }
    }

    /// Zero any window whose boundary has passed since the last reset.
    pub fn roll(&mut self, now: u64) {
        let day = |ts: u64| ts / SECS_PER_DAY;
        if day(now) == day(self.last_reset) {
            return;
        }
        self.daily = 0;
        let days = day(now).saturating_sub(day(self.last_reset));
        if days >= 7 {
            self.weekly = 0;
        }
        if days >= 30 {
            self.monthly = 0;
        }
        self.last_reset = now;
    }

    /// Add `amount` to every window, rolling boundaries first.
    pub fn accrue(&mut self, amount: u64, now: u64) {
        self.roll(now);
        self.total = self.total.saturating_add(amount);
        self.daily = self.daily.saturating_add(amount);
        self.weekly = self.weekly.saturating_add(amount);
        self.monthly = self.monthly.saturating_add(amount);
    }
}

impl Write for CommissionFund {
    fn write(&self, writer: &mut impl BufMut) {
        self.total.write(writer);
        self.daily.write(writer);
        self.weekly.write(writer);
        self.monthly.write(writer);
        self.last_reset.write(writer);
    }
}

impl Read for CommissionFund {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            total: u64::read(reader)?,
            daily: u64::read(reader)?,
            weekly: u64::read(reader)?,
            monthly: u64::read(reader)?,
            last_reset: u64::read(reader)?,
        })
    }
}

impl FixedSize for CommissionFund {
    const SIZE: usize = 5 * u64::SIZE;
}
