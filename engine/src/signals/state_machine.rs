// Turning-point detection on the trend line, with per-symbol memory so a
// direction is reported once per change.

use chrono::{DateTime, Utc};
use shared::models::{Direction, SignalMode};
use shared::utils::round_to;
use std::collections::HashMap;

/// Middle point is a local minimum: flat-or-falling into it, rising out.
pub fn switch_up(a: f64, b: f64, c: f64) -> bool {
    b < c && b <= a
}

/// Middle point is a local maximum: flat-or-rising into it, falling out.
pub fn switch_down(a: f64, b: f64, c: f64) -> bool {
    b > c && b >= a
}

/// Acceleration ratio of the last slope against the previous one, scaled so
/// equal slopes score 50 and capped at 100. Zero when the previous slope is flat.
pub fn strength_score(a: f64, b: f64, c: f64) -> f64 {
    let slope_prev = (b - a).abs();
    if slope_prev == 0.0 {
        return 0.0;
    }
    let slope_now = (c - b).abs();
    round_to((slope_now / slope_prev * 50.0).min(100.0), 1)
}

/// The last three trend-line points `(a, b, c)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendTail {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl TrendTail {
    /// Takes offsets -3, -2, -1. `None` for fewer than three points or any NaN.
    pub fn from_series(series: &[f64]) -> Option<Self> {
        let n = series.len();
        if n < 3 {
            return None;
        }
        let tail = TrendTail {
            a: series[n - 3],
            b: series[n - 2],
            c: series[n - 1],
        };
        tail.is_defined().then_some(tail)
    }

    fn is_defined(&self) -> bool {
        self.a.is_finite() && self.b.is_finite() && self.c.is_finite()
    }

    pub fn turn(&self) -> Option<Direction> {
        if !self.is_defined() {
            None
        } else if switch_up(self.a, self.b, self.c) {
            Some(Direction::Up)
        } else if switch_down(self.a, self.b, self.c) {
            Some(Direction::Down)
        } else {
            None
        }
    }

    pub fn strength(&self) -> f64 {
        strength_score(self.a, self.b, self.c)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolState {
    pub last_direction: Direction,
    pub last_emitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub direction: Direction,
    pub tail: TrendTail,
    pub strength: f64,
}

/// Per-symbol direction memory for one evaluation mode.
#[derive(Debug)]
pub struct SignalStateMachine {
    mode: SignalMode,
    states: HashMap<String, SymbolState>,
}

impl SignalStateMachine {
    pub fn new(mode: SignalMode) -> Self {
        Self {
            mode,
            states: HashMap::new(),
        }
    }

    pub fn mode(&self) -> SignalMode {
        self.mode
    }

    pub fn state(&self, symbol: &str) -> Option<&SymbolState> {
        self.states.get(symbol)
    }

    /// Evaluates the tail of `trend` for `symbol`. A transition is returned,
    /// and committed, only when the detected turn differs from the stored
    /// direction; elapsed time plays no part.
    pub fn observe(
        &mut self,
        symbol: &str,
        trend: &[f64],
        at: DateTime<Utc>,
    ) -> Option<Transition> {
        let tail = TrendTail::from_series(trend);
        let turn = tail.and_then(|t| t.turn());

        let state = self.states.entry(symbol.to_string()).or_default();
        let (tail, direction) = match (tail, turn) {
            (Some(tail), Some(direction)) if direction != state.last_direction => (tail, direction),
            _ => return None,
        };

        state.last_direction = direction;
        state.last_emitted_at = Some(at);

        Some(Transition {
            direction,
            tail,
            strength: tail.strength(),
        })
    }
}
