// Stop-loss / take-profit levels for an emitted transition
use shared::models::{Candle, Direction, RiskLevels};

use crate::indicators::average_true_range;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskPolicy {
    /// Volatility-scaled distances from the entry.
    Atr {
        lookback: usize,
        sl_multiplier: f64,
        tp_multiplier: f64,
    },
    /// Stop at the trailing swing extreme, target at twice the risk.
    Swing { lookback: usize },
}

/// ATR-based levels. BUY stops below and targets above the entry; SELL mirrors.
pub fn atr_levels(
    direction: Direction,
    entry: f64,
    atr: f64,
    sl_multiplier: f64,
    tp_multiplier: f64,
) -> Option<RiskLevels> {
    let (stop_loss, take_profit) = match direction {
        Direction::Up => (entry - sl_multiplier * atr, entry + tp_multiplier * atr),
        Direction::Down => (entry + sl_multiplier * atr, entry - tp_multiplier * atr),
        Direction::Neutral => return None,
    };
    Some(RiskLevels { stop_loss, take_profit })
}

/// Swing-based levels: the stop is the lowest low (BUY) or highest high
/// (SELL) of `window`, and `take_profit = entry + 2 * (entry - stop)`.
pub fn swing_levels(direction: Direction, entry: f64, window: &[Candle]) -> Option<RiskLevels> {
    if window.is_empty() {
        return None;
    }
    let stop_loss = match direction {
        Direction::Up => window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min),
        Direction::Down => window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max),
        Direction::Neutral => return None,
    };
    Some(RiskLevels {
        stop_loss,
        take_profit: entry + 2.0 * (entry - stop_loss),
    })
}

impl RiskPolicy {
    /// Levels for a transition whose entry is the close of the last candle in
    /// `candles`. `None` when there is not enough history.
    pub fn levels(
        &self,
        direction: Direction,
        entry: f64,
        candles: &[Candle],
    ) -> Option<RiskLevels> {
        match *self {
            RiskPolicy::Atr {
                lookback,
                sl_multiplier,
                tp_multiplier,
            } => {
                let atr = average_true_range(candles, lookback)?;
                atr_levels(direction, entry, atr, sl_multiplier, tp_multiplier)
            }
            RiskPolicy::Swing { lookback } => {
                let start = candles.len().saturating_sub(lookback);
                swing_levels(direction, entry, &candles[start..])
            }
        }
    }
}
