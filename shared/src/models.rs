use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>, // bucket open time
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    // False while the bucket is still forming on the exchange side.
    pub confirmed: bool,
}

impl Candle {
    /// Midpoint of the candle's range, `(high + low) / 2`.
    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

/// Oldest-first window of candles for one symbol at one timeframe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleSeries {
    pub symbol: String,
    pub timeframe: TimeFrame,
    pub candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(symbol: impl Into<String>, timeframe: TimeFrame, candles: Vec<Candle>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            candles,
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// True when the newest candle is still forming.
    pub fn has_forming_tail(&self) -> bool {
        self.candles.last().map_or(false, |c| !c.confirmed)
    }

    /// The series without a trailing forming candle.
    pub fn confirmed(&self) -> &[Candle] {
        if self.has_forming_tail() {
            &self.candles[..self.candles.len() - 1]
        } else {
            &self.candles
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TimeFrame {
    Minute1,
    Minute3,
    Minute5,
    Minute15,
    Minute30,
    Hour1,
    Hour4,
    Day1,
}

impl TimeFrame {
    pub fn minutes(&self) -> i64 {
        match self {
            TimeFrame::Minute1 => 1,
            TimeFrame::Minute3 => 3,
            TimeFrame::Minute5 => 5,
            TimeFrame::Minute15 => 15,
            TimeFrame::Minute30 => 30,
            TimeFrame::Hour1 => 60,
            TimeFrame::Hour4 => 240,
            TimeFrame::Day1 => 1440,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Interval string in the "5m" / "1h" / "1d" notation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::Minute1 => "1m",
            TimeFrame::Minute3 => "3m",
            TimeFrame::Minute5 => "5m",
            TimeFrame::Minute15 => "15m",
            TimeFrame::Minute30 => "30m",
            TimeFrame::Hour1 => "1h",
            TimeFrame::Hour4 => "4h",
            TimeFrame::Day1 => "1d",
        }
    }

    // Bybit expresses intraday intervals in minutes and daily as "D".
    pub fn as_minutes_code(&self) -> String {
        match self {
            TimeFrame::Day1 => "D".to_string(),
            other => other.minutes().to_string(),
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFrame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(TimeFrame::Minute1),
            "3m" => Ok(TimeFrame::Minute3),
            "5m" => Ok(TimeFrame::Minute5),
            "15m" => Ok(TimeFrame::Minute15),
            "30m" => Ok(TimeFrame::Minute30),
            "1h" | "60m" => Ok(TimeFrame::Hour1),
            "4h" => Ok(TimeFrame::Hour4),
            "1d" | "d" => Ok(TimeFrame::Day1),
            other => Err(format!("unsupported timeframe '{}'", other)),
        }
    }
}

/// Direction of the last turning point seen for a symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Neutral,
    Up,
    Down,
}

impl Direction {
    /// Trade side label used in alerts and the signal log.
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Neutral => "NONE",
            Direction::Up => "BUY",
            Direction::Down => "SELL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which candle set a signal is evaluated on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SignalMode {
    // Includes the still-forming candle; may later be reversed.
    Early,
    // Forming candle dropped before evaluation.
    Confirmed,
}

impl SignalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalMode::Early => "early",
            SignalMode::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for SignalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "early" => Ok(SignalMode::Early),
            "confirmed" => Ok(SignalMode::Confirmed),
            other => Err(format!("unknown signal mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLevels {
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// One emitted direction change, handed to the alert and log collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEvent {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub mode: SignalMode,
    pub entry_price: f64,
    pub trend_value: f64,
    pub strength: f64,
    pub timestamp: DateTime<Utc>,
    pub candle_time: DateTime<Utc>,
    pub risk: Option<RiskLevels>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(minute: u32, confirmed: bool) -> Candle {
        Candle {
            symbol: "BTCUSDT".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
            open: 1.0,
            high: 3.0,
            low: 1.0,
            close: 2.0,
            volume: 10.0,
            confirmed,
        }
    }

    #[test]
    fn test_confirmed_drops_forming_tail() {
        let series = CandleSeries::new(
            "BTCUSDT",
            TimeFrame::Minute5,
            vec![candle(0, true), candle(5, true), candle(10, false)],
        );
        assert!(series.has_forming_tail());
        assert_eq!(series.confirmed().len(), 2);
    }

    #[test]
    fn test_confirmed_keeps_fully_closed_series() {
        let candles = vec![candle(0, true), candle(5, true)];
        let series = CandleSeries::new("BTCUSDT", TimeFrame::Minute5, candles);
        assert!(!series.has_forming_tail());
        assert_eq!(series.confirmed().len(), 2);
    }

    #[test]
    fn test_timeframe_parsing() {
        assert_eq!("5m".parse::<TimeFrame>().unwrap(), TimeFrame::Minute5);
        assert_eq!("1H".parse::<TimeFrame>().unwrap(), TimeFrame::Hour1);
        assert_eq!(TimeFrame::Minute15.as_minutes_code(), "15");
        assert_eq!(TimeFrame::Day1.as_minutes_code(), "D");
        assert!("7m".parse::<TimeFrame>().is_err());
    }

    #[test]
    fn test_hl2() {
        assert_eq!(candle(0, true).hl2(), 2.0);
    }
}
