use chrono::{FixedOffset, NaiveDate, Offset, Utc};

/// Source of "today" for reconciliation passes
pub trait Clock: Send + Sync {
    /// Current calendar date in the clock's offset
    fn today(&self) -> NaiveDate;

    /// Offset used to turn stored timestamps into calendar dates
    fn offset(&self) -> FixedOffset {
        Utc.fix()
    }
}

/// Wall clock shifted by a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Out-of-range offsets fall back to UTC
    pub fn from_offset_minutes(minutes: i32) -> Self {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                tracing::warn!("Invalid UTC offset of {} minutes, using UTC", minutes);
                Utc.fix()
            });
        Self { offset }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(Utc.fix())
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Clock pinned to one date (tests, `--date` overrides, previews)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    date: NaiveDate,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self { date, offset: Utc.fix() }
    }

    pub fn with_offset(date: NaiveDate, offset: FixedOffset) -> Self {
        Self { date, offset }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.date
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}
