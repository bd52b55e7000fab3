// Engine settings, loaded from environment variables on top of built-in defaults
use serde::Deserialize;
use shared::models::{SignalMode, TimeFrame};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::data::exchange::ExchangeFlavor;
use crate::error::{EngineError, Result};
use crate::indicators::{TrendLine, TrendLineParams};
use crate::signals::risk::RiskPolicy;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskPolicyKind {
    Atr,
    Swing,
}

impl FromStr for RiskPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "atr" => Ok(RiskPolicyKind::Atr),
            "swing" => Ok(RiskPolicyKind::Swing),
            other => Err(format!("unknown risk policy '{}'", other)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    // Exchange access
    pub exchange: ExchangeFlavor,
    pub endpoints: Vec<String>,
    pub request_timeout_secs: u64,
    pub failover_budget: u32,
    pub failover_backoff_ms: u64,
    pub max_concurrency: usize,

    // Universe and candles
    pub timeframe: TimeFrame,
    pub universe_size: usize,
    pub quote_suffix: String,
    pub candle_limit: usize,
    pub min_candles: usize,

    // Trend line
    pub knn_neighbors: usize,
    pub price_len: usize,
    pub target_len: usize,
    pub smoothing_len: usize,
    pub auto_scale_smoothing: bool,

    // Signals and risk
    pub signal_modes: Vec<SignalMode>,
    pub risk_policy: RiskPolicyKind,
    pub atr_lookback: usize,
    pub sl_multiplier: f64,
    pub tp_multiplier: f64,
    pub swing_lookback: usize,

    // Cycle timing
    pub scan_interval_secs: u64,
    pub align_to_candle_close: bool,
    pub close_grace_secs: u64,
    pub fault_backoff_secs: u64,
    pub heartbeat_minutes: u64,

    // Collaborators
    pub signal_log_path: Option<PathBuf>,
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub delivery_pause_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let exchange = ExchangeFlavor::Binance;
        EngineSettings {
            exchange,
            endpoints: exchange.default_endpoints(),
            request_timeout_secs: 10,
            failover_budget: 3,
            failover_backoff_ms: 1000,
            max_concurrency: 4,
            timeframe: TimeFrame::Minute5,
            universe_size: 25,
            quote_suffix: "USDT".to_string(),
            candle_limit: 200,
            min_candles: 50,
            knn_neighbors: 3,
            price_len: 5,
            target_len: 5,
            smoothing_len: 5,
            auto_scale_smoothing: false,
            signal_modes: vec![SignalMode::Confirmed],
            risk_policy: RiskPolicyKind::Atr,
            atr_lookback: 14,
            sl_multiplier: 1.5,
            tp_multiplier: 3.0,
            swing_lookback: 10,
            scan_interval_secs: 60,
            align_to_candle_close: false,
            close_grace_secs: 2,
            fault_backoff_secs: 5,
            heartbeat_minutes: 30,
            signal_log_path: Some(PathBuf::from("signals.csv")),
            bot_token: None,
            chat_id: None,
            delivery_pause_ms: 1500,
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_value(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| EngineError::ConfigError(format!("{}='{}': {}", name, raw, e))),
        None => Ok(None),
    }
}

fn env_bool(name: &str) -> Option<bool> {
    env_value(name).map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"))
}

fn env_list<T>(name: &str) -> Result<Option<Vec<T>>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_value(name) {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<T>()
                    .map_err(|e| EngineError::ConfigError(format!("{}: '{}': {}", name, s, e)))
            })
            .collect::<Result<Vec<T>>>()
            .map(Some),
        None => Ok(None),
    }
}

macro_rules! override_from_env {
    ($target:expr, $name:expr) => {
        if let Some(v) = env_parse($name)? {
            $target = v;
        }
    };
}

impl EngineSettings {
    /// Defaults overridden by `TN_*` variables; alert credentials come from
    /// `BOT_TOKEN` and `CHAT_ID`.
    pub fn from_env() -> Result<Self> {
        let mut s = EngineSettings::default();

        if let Some(exchange) = env_parse::<ExchangeFlavor>("TN_EXCHANGE")? {
            s.exchange = exchange;
            s.endpoints = exchange.default_endpoints();
        }
        if let Some(endpoints) = env_list::<String>("TN_ENDPOINTS")? {
            s.endpoints = endpoints;
        }
        override_from_env!(s.request_timeout_secs, "TN_REQUEST_TIMEOUT_SECS");
        override_from_env!(s.failover_budget, "TN_FAILOVER_BUDGET");
        override_from_env!(s.failover_backoff_ms, "TN_FAILOVER_BACKOFF_MS");
        override_from_env!(s.max_concurrency, "TN_MAX_CONCURRENCY");

        override_from_env!(s.timeframe, "TN_TIMEFRAME");
        override_from_env!(s.universe_size, "TN_UNIVERSE_SIZE");
        override_from_env!(s.quote_suffix, "TN_QUOTE_SUFFIX");
        override_from_env!(s.candle_limit, "TN_CANDLE_LIMIT");
        override_from_env!(s.min_candles, "TN_MIN_CANDLES");

        override_from_env!(s.knn_neighbors, "TN_KNN_NEIGHBORS");
        override_from_env!(s.price_len, "TN_PRICE_LEN");
        override_from_env!(s.target_len, "TN_TARGET_LEN");
        override_from_env!(s.smoothing_len, "TN_SMOOTHING_LEN");
        if let Some(v) = env_bool("TN_AUTO_SCALE_SMOOTHING") {
            s.auto_scale_smoothing = v;
        }

        if let Some(modes) = env_list::<SignalMode>("TN_SIGNAL_MODES")? {
            s.signal_modes = modes;
        }
        override_from_env!(s.risk_policy, "TN_RISK_POLICY");
        override_from_env!(s.atr_lookback, "TN_ATR_LOOKBACK");
        override_from_env!(s.sl_multiplier, "TN_SL_MULTIPLIER");
        override_from_env!(s.tp_multiplier, "TN_TP_MULTIPLIER");
        override_from_env!(s.swing_lookback, "TN_SWING_LOOKBACK");

        override_from_env!(s.scan_interval_secs, "TN_SCAN_INTERVAL_SECS");
        if let Some(v) = env_bool("TN_ALIGN_TO_CANDLE_CLOSE") {
            s.align_to_candle_close = v;
        }
        override_from_env!(s.close_grace_secs, "TN_CLOSE_GRACE_SECS");
        override_from_env!(s.fault_backoff_secs, "TN_FAULT_BACKOFF_SECS");
        override_from_env!(s.heartbeat_minutes, "TN_HEARTBEAT_MINUTES");

        if let Some(path) = env_value("TN_SIGNAL_LOG") {
            s.signal_log_path = match path.to_lowercase().as_str() {
                "off" | "none" => None,
                _ => Some(PathBuf::from(path)),
            };
        }
        s.bot_token = env_value("BOT_TOKEN");
        s.chat_id = env_value("CHAT_ID");
        override_from_env!(s.delivery_pause_ms, "TN_DELIVERY_PAUSE_MS");

        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(EngineError::ConfigError(msg.to_string()));
        if self.endpoints.is_empty() {
            return fail("at least one exchange endpoint is required");
        }
        if self.failover_budget == 0 {
            return fail("failover budget must be greater than 0");
        }
        if self.max_concurrency == 0 {
            return fail("max concurrency must be greater than 0");
        }
        if self.universe_size == 0 {
            return fail("universe size must be greater than 0");
        }
        if self.knn_neighbors == 0
            || self.price_len == 0
            || self.target_len == 0
            || self.smoothing_len == 0
        {
            return fail("knn neighbors and rolling lengths must be greater than 0");
        }
        if self.min_candles < 3 || self.candle_limit < self.min_candles {
            return fail("candle limit must be at least the minimum usable length (>= 3)");
        }
        let required = TrendLine::new(self.trend_params()).min_history();
        if self.candle_limit < required {
            return Err(EngineError::ConfigError(format!(
                "candle limit {} is below the {} candles the trend line needs",
                self.candle_limit, required
            )));
        }
        if self.min_candles < required {
            tracing::warn!(
                min_candles = self.min_candles,
                required,
                "Minimum candle count is below trend line history; short symbols will be skipped"
            );
        }
        if self.signal_modes.is_empty() {
            return fail("at least one signal mode is required");
        }
        if self.atr_lookback == 0 || self.swing_lookback == 0 {
            return fail("risk lookbacks must be greater than 0");
        }
        if !(self.sl_multiplier > 0.0 && self.tp_multiplier > 0.0) {
            return fail("stop-loss and take-profit multipliers must be positive");
        }
        if self.bot_token.is_some() != self.chat_id.is_some() {
            tracing::warn!("Only one of BOT_TOKEN / CHAT_ID is set; alerts will be logged only");
        }
        Ok(())
    }

    /// Smoothing length actually fed to the WMA. With auto-scaling the base
    /// length is treated as tuned for 60-minute candles and rescaled.
    pub fn effective_smoothing_len(&self) -> usize {
        if !self.auto_scale_smoothing {
            return self.smoothing_len;
        }
        let scaled = self.smoothing_len as f64 * 60.0 / self.timeframe.minutes() as f64;
        (scaled.round() as usize).max(1)
    }

    pub fn trend_params(&self) -> TrendLineParams {
        TrendLineParams {
            price_len: self.price_len,
            target_len: self.target_len,
            neighbors: self.knn_neighbors,
            smoothing_len: self.effective_smoothing_len(),
        }
    }

    pub fn risk(&self) -> RiskPolicy {
        match self.risk_policy {
            RiskPolicyKind::Atr => RiskPolicy::Atr {
                lookback: self.atr_lookback,
                sl_multiplier: self.sl_multiplier,
                tp_multiplier: self.tp_multiplier,
            },
            RiskPolicyKind::Swing => RiskPolicy::Swing { lookback: self.swing_lookback },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn failover_backoff(&self) -> Duration {
        Duration::from_millis(self.failover_backoff_ms)
    }

    pub fn alert_credentials(&self) -> Option<(&str, &str)> {
        match (&self.bot_token, &self.chat_id) {
            (Some(token), Some(chat)) => Some((token.as_str(), chat.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let s = EngineSettings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.universe_size, 25);
        assert_eq!(s.failover_budget, 3);
        assert_eq!(s.effective_smoothing_len(), 5);
    }

    #[test]
    fn test_auto_scaled_smoothing() {
        let mut s = EngineSettings::default();
        s.auto_scale_smoothing = true;
        s.timeframe = TimeFrame::Minute15;
        assert_eq!(s.effective_smoothing_len(), 20);
        s.timeframe = TimeFrame::Hour4;
        // 5 * 60 / 240 = 1.25 -> 1
        assert_eq!(s.effective_smoothing_len(), 1);
        s.timeframe = TimeFrame::Day1;
        assert_eq!(s.effective_smoothing_len(), 1);
    }

    #[test]
    fn test_validate_rejects_empty_endpoints() {
        let mut s = EngineSettings::default();
        s.endpoints.clear();
        assert!(matches!(s.validate(), Err(EngineError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let mut s = EngineSettings::default();
        s.failover_budget = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_candle_limit_below_trend_history() {
        let mut s = EngineSettings::default();
        s.min_candles = 20;
        s.candle_limit = 30;
        assert!(matches!(s.validate(), Err(EngineError::ConfigError(_))));

        // Defaults need 37 candles.
        s.candle_limit = 37;
        assert!(s.validate().is_ok());

        // Longer rolling windows raise the requirement.
        s.price_len = 40;
        assert!(s.validate().is_err());
        s.candle_limit = 49;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_trend_params_use_effective_smoothing() {
        let mut s = EngineSettings::default();
        s.auto_scale_smoothing = true;
        s.timeframe = TimeFrame::Minute15;
        assert_eq!(s.trend_params().smoothing_len, 20);
        assert_eq!(s.trend_params().neighbors, 3);
    }

    #[test]
    fn test_risk_policy_from_settings() {
        let mut s = EngineSettings::default();
        s.risk_policy = RiskPolicyKind::Swing;
        assert_eq!(s.risk(), RiskPolicy::Swing { lookback: 10 });
    }

    #[test]
    fn test_alert_credentials_require_both() {
        let mut s = EngineSettings::default();
        s.bot_token = Some("token".into());
        assert!(s.alert_credentials().is_none());
        s.chat_id = Some("42".into());
        assert_eq!(s.alert_credentials(), Some(("token", "42")));
    }

    #[test]
    fn test_env_helpers_parse_and_reject() {
        // Names are unique to this test so parallel tests never collide.
        env::set_var("TN_UNIT_LIST", " 5m, 1h ,");
        env::set_var("TN_UNIT_BAD_NUMBER", "twelve");
        env::set_var("TN_UNIT_FLAG", "Yes");
        env::set_var("TN_UNIT_BLANK", "   ");

        let frames = env_list::<TimeFrame>("TN_UNIT_LIST").unwrap().unwrap();
        assert_eq!(frames, vec![TimeFrame::Minute5, TimeFrame::Hour1]);
        assert!(matches!(
            env_parse::<u64>("TN_UNIT_BAD_NUMBER"),
            Err(EngineError::ConfigError(_))
        ));
        assert_eq!(env_bool("TN_UNIT_FLAG"), Some(true));
        assert!(env_value("TN_UNIT_BLANK").is_none());
        assert!(env_parse::<u64>("TN_UNIT_UNSET").unwrap().is_none());
    }
}
