// Exchange HTTP surface: the transport seam used by the fail-over router and
// the per-exchange URL layouts and payload shapes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use shared::models::{Candle, TimeFrame};
use shared::utils::utc_from_millis;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// One GET returning a JSON document. Implementations report transport
/// problems and non-2xx statuses as errors; the payload itself is not inspected.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value>;
}

/// reqwest-backed transport with a per-request timeout.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value> {
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

/// Returns the exchange's error message when the payload is an error object
/// rather than data.
pub fn detect_api_error(payload: &Value) -> Option<String> {
    let obj = payload.as_object()?;

    // Binance: {"code": -1121, "msg": "Invalid symbol."}
    if let Some(code) = obj.get("code").and_then(Value::as_i64) {
        if code != 0 {
            let msg = obj.get("msg").and_then(Value::as_str).unwrap_or("unknown error");
            return Some(format!("{} ({})", msg, code));
        }
    }

    // Bybit: {"retCode": 10001, "retMsg": "params error", ...}
    if let Some(code) = obj.get("retCode").and_then(Value::as_i64) {
        if code != 0 {
            let msg = obj.get("retMsg").and_then(Value::as_str).unwrap_or("unknown error");
            return Some(format!("{} ({})", msg, code));
        }
    }

    None
}

/// Numbers arrive either as JSON numbers or as decimal strings.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeFlavor {
    Binance,
    Bybit,
}

impl FromStr for ExchangeFlavor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(ExchangeFlavor::Binance),
            "bybit" => Ok(ExchangeFlavor::Bybit),
            other => Err(format!("unsupported exchange '{}'", other)),
        }
    }
}

impl ExchangeFlavor {
    pub fn default_endpoints(&self) -> Vec<String> {
        let hosts: &[&str] = match self {
            ExchangeFlavor::Binance => &[
                "https://api.binance.com",
                "https://api1.binance.com",
                "https://api2.binance.com",
                "https://api3.binance.com",
            ],
            ExchangeFlavor::Bybit => &["https://api.bybit.com", "https://api.bytick.com"],
        };
        hosts.iter().map(|h| h.to_string()).collect()
    }

    pub fn ticker_request(&self) -> (&'static str, Vec<(String, String)>) {
        match self {
            ExchangeFlavor::Binance => ("/api/v3/ticker/24hr", Vec::new()),
            ExchangeFlavor::Bybit => (
                "/v5/market/tickers",
                vec![("category".into(), "spot".into())],
            ),
        }
    }

    pub fn kline_request(
        &self,
        symbol: &str,
        timeframe: TimeFrame,
        limit: usize,
    ) -> (&'static str, Vec<(String, String)>) {
        match self {
            ExchangeFlavor::Binance => (
                "/api/v3/klines",
                vec![
                    ("symbol".into(), symbol.to_string()),
                    ("interval".into(), timeframe.as_str().to_string()),
                    ("limit".into(), limit.to_string()),
                ],
            ),
            ExchangeFlavor::Bybit => (
                "/v5/market/kline",
                vec![
                    ("category".into(), "spot".into()),
                    ("symbol".into(), symbol.to_string()),
                    ("interval".into(), timeframe.as_minutes_code()),
                    ("limit".into(), limit.to_string()),
                ],
            ),
        }
    }

    /// The ticker array inside a 24h statistics payload (`Null` if absent).
    pub fn ticker_list<'a>(&self, payload: &'a Value) -> &'a Value {
        match self {
            ExchangeFlavor::Binance => payload,
            ExchangeFlavor::Bybit => &payload["result"]["list"],
        }
    }

    /// Field carrying 24h volume in quote currency.
    pub fn volume_field(&self) -> &'static str {
        match self {
            ExchangeFlavor::Binance => "quoteVolume",
            ExchangeFlavor::Bybit => "turnover24h",
        }
    }

    pub fn kline_rows<'a>(&self, payload: &'a Value) -> &'a Value {
        match self {
            ExchangeFlavor::Binance => payload,
            ExchangeFlavor::Bybit => &payload["result"]["list"],
        }
    }

    pub fn min_row_fields(&self) -> usize {
        match self {
            // openTime, o, h, l, c, v, closeTime
            ExchangeFlavor::Binance => 7,
            // startTime, o, h, l, c, v
            ExchangeFlavor::Bybit => 6,
        }
    }

    pub fn newest_first(&self) -> bool {
        matches!(self, ExchangeFlavor::Bybit)
    }

    /// Converts one kline row. `now` decides whether the bucket has closed.
    pub fn parse_row(
        &self,
        row: &[Value],
        symbol: &str,
        timeframe: TimeFrame,
        now: DateTime<Utc>,
    ) -> Option<Candle> {
        if row.len() < self.min_row_fields() {
            return None;
        }

        let open_ms = value_as_i64(&row[0])?;
        let timestamp = utc_from_millis(open_ms)?;
        let close_time = match self {
            // Binance close time is the last millisecond of the bucket.
            ExchangeFlavor::Binance => utc_from_millis(value_as_i64(&row[6])?)?,
            ExchangeFlavor::Bybit => {
                timestamp + timeframe.duration() - chrono::Duration::milliseconds(1)
            }
        };

        Some(Candle {
            symbol: symbol.to_string(),
            timestamp,
            open: value_as_f64(&row[1])?,
            high: value_as_f64(&row[2])?,
            low: value_as_f64(&row[3])?,
            close: value_as_f64(&row[4])?,
            volume: value_as_f64(&row[5])?,
            confirmed: close_time < now,
        })
    }
}
