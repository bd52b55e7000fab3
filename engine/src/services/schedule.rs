// Delay between scan cycles
use chrono::{DateTime, Utc};
use shared::models::TimeFrame;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleSchedule {
    /// Sleep a fixed interval after each cycle.
    Fixed(Duration),
    /// Wake just after the next candle close of `timeframe`.
    CandleClose { timeframe: TimeFrame, grace: Duration },
}

/// Start of the next `timeframe` bucket strictly after `now`.
pub fn next_candle_close(now: DateTime<Utc>, timeframe: TimeFrame) -> DateTime<Utc> {
    let period_ms = timeframe.minutes() * 60_000;
    let now_ms = now.timestamp_millis();
    let next_ms = (now_ms.div_euclid(period_ms) + 1) * period_ms;
    DateTime::from_timestamp_millis(next_ms).unwrap_or(now)
}

impl CycleSchedule {
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        match *self {
            CycleSchedule::Fixed(interval) => interval,
            CycleSchedule::CandleClose { timeframe, grace } => {
                let until_close = (next_candle_close(now, timeframe) - now)
                    .to_std()
                    .unwrap_or_default();
                until_close + grace
            }
        }
    }
}
