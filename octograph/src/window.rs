use chrono::{DateTime, Offset, Timelike, Utc};
use chrono_tz::Tz;
use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};

use crate::pipeline::PipelineError;

/// Lookback of the very first run, which imports all available history.
pub const BACKFILL_WEEKS: i64 = 208;

/// Longest recent lookback; anything at or beyond this is a backfill.
pub const MAX_LOOKBACK_HOURS: u32 = BACKFILL_WEEKS as u32 * 7 * 24;

pub const DEFAULT_LOOKBACK_HOURS: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    Backfill,
    Hours(u32),
}

impl Lookback {
    fn duration(&self) -> chrono::Duration {
        match self {
            Self::Backfill => chrono::Duration::weeks(BACKFILL_WEEKS),
            Self::Hours(hours) => chrono::Duration::hours(i64::from(*hours)),
        }
    }
}

/// Half-open retrieval window `[from, to)`, both ends carrying the local
/// offset they are requested with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    from_iso: String,
    to_iso: String,
}

impl Window {
    pub fn new(from: OffsetDateTime, to: OffsetDateTime) -> Result<Self, PipelineError> {
        if to <= from {
            return Err(PipelineError::Configuration(format!(
                "empty retrieval window {from} .. {to}"
            )));
        }
        let format = |ts: OffsetDateTime| {
            ts.format(&Rfc3339)
                .map_err(|e| PipelineError::Configuration(format!("unformattable timestamp {ts}: {e}")))
        };
        Ok(Self {
            from_iso: format(from)?,
            to_iso: format(to)?,
        })
    }

    /// Window of `lookback` ending at the start of the current hour in `tz`.
    /// Steps back from `now` instead of resolving a local wall time, so the
    /// repeated hour after clocks go back ends at its own start.
    pub fn select(now: DateTime<Utc>, tz: Tz, lookback: Lookback) -> Result<Self, PipelineError> {
        let local = now.with_timezone(&tz);
        let into_hour = chrono::Duration::seconds(i64::from(local.minute() * 60 + local.second()))
            + chrono::Duration::nanoseconds(i64::from(local.nanosecond()));
        let to = now
            .checked_sub_signed(into_hour)
            .ok_or_else(|| PipelineError::Configuration(format!("no hour start before {now}")))?;
        let from = to.checked_sub_signed(lookback.duration()).ok_or_else(|| {
            PipelineError::Configuration(format!("lookback {lookback:?} reaches out of range"))
        })?;

        Self::new(
            to_offset_datetime(from.with_timezone(&tz))?,
            to_offset_datetime(to.with_timezone(&tz))?,
        )
    }

    /// `period_from` as sent to the API.
    pub fn from_iso(&self) -> &str {
        &self.from_iso
    }

    /// `period_to` as sent to the API.
    pub fn to_iso(&self) -> &str {
        &self.to_iso
    }
}

fn to_offset_datetime(dt: DateTime<Tz>) -> Result<OffsetDateTime, PipelineError> {
    let offset = UtcOffset::from_whole_seconds(dt.offset().fix().local_minus_utc())
        .map_err(|e| PipelineError::Configuration(format!("unsupported offset for {dt}: {e}")))?;
    let utc = OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| PipelineError::Configuration(format!("timestamp out of range for {dt}: {e}")))?;
    Ok(utc.to_offset(offset))
}
