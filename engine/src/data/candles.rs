// Candle store fetcher: bounded kline history for one symbol, normalised to
// an oldest-first CandleSeries
use chrono::{DateTime, Utc};
use serde_json::Value;
use shared::models::{CandleSeries, TimeFrame};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::exchange::ExchangeFlavor;
use super::failover::FailoverRouter;

/// Why a symbol has no usable candles this cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Unavailable {
    Request(String),
    NotAList,
    TooShort { usable: usize, required: usize },
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::Request(msg) => write!(f, "request failed: {}", msg),
            Unavailable::NotAList => f.write_str("kline payload is not a list"),
            Unavailable::TooShort { usable, required } => {
                write!(f, "only {} usable candles, {} required", usable, required)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum CandleFetch {
    Ready(CandleSeries),
    Unavailable(Unavailable),
}

/// Turns a raw kline payload into a series. Rows that are too short or hold
/// unparsable numbers are skipped; the result is sorted oldest first.
pub fn normalize_klines(
    payload: &Value,
    flavor: ExchangeFlavor,
    symbol: &str,
    timeframe: TimeFrame,
    now: DateTime<Utc>,
    min_candles: usize,
) -> CandleFetch {
    let Some(rows) = flavor.kline_rows(payload).as_array() else {
        return CandleFetch::Unavailable(Unavailable::NotAList);
    };

    let mut candles: Vec<_> = rows
        .iter()
        .filter_map(|row| row.as_array())
        .filter_map(|row| flavor.parse_row(row, symbol, timeframe, now))
        .collect();

    if flavor.newest_first() {
        candles.reverse();
    }
    // Exchanges normally return sorted rows; enforce it anyway.
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);

    if candles.len() < min_candles {
        return CandleFetch::Unavailable(Unavailable::TooShort {
            usable: candles.len(),
            required: min_candles,
        });
    }

    CandleFetch::Ready(CandleSeries::new(symbol, timeframe, candles))
}

pub struct CandleFetcher {
    router: Arc<FailoverRouter>,
    flavor: ExchangeFlavor,
    min_candles: usize,
}

impl CandleFetcher {
    pub fn new(router: Arc<FailoverRouter>, flavor: ExchangeFlavor, min_candles: usize) -> Self {
        Self {
            router,
            flavor,
            min_candles,
        }
    }

    pub async fn fetch(&self, symbol: &str, timeframe: TimeFrame, limit: usize) -> CandleFetch {
        let (path, query) = self.flavor.kline_request(symbol, timeframe, limit);
        let payload = match self.router.get_json(path, &query).await {
            Ok(payload) => payload,
            Err(e) => return CandleFetch::Unavailable(Unavailable::Request(e.to_string())),
        };

        let fetched = normalize_klines(
            &payload,
            self.flavor,
            symbol,
            timeframe,
            Utc::now(),
            self.min_candles,
        );
        if let CandleFetch::Ready(series) = &fetched {
            debug!(
                symbol = %symbol,
                candles = series.len(),
                forming_tail = series.has_forming_tail(),
                "Candles fetched"
            );
        }
        fetched
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::failover::tests::ScriptedTransport;
    use crate::data::failover::EndpointPool;
    use crate::error::EngineError;
    use chrono::TimeZone;
    use serde_json::json;
    use std::time::Duration;

    pub(crate) fn binance_row(open: DateTime<Utc>, high: f64, low: f64, close: f64) -> Value {
        let open_ms = open.timestamp_millis();
        json!([
            open_ms,
            close.to_string(),
            high.to_string(),
            low.to_string(),
            close.to_string(),
            "10.0",
            open_ms + 5 * 60_000 - 1,
            "0", 1, "0", "0", "0"
        ])
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn five_minute_rows(count: i64) -> Vec<Value> {
        (0..count)
            .map(|i| binance_row(t0() + chrono::Duration::minutes(5 * i), 2.0, 1.0, 1.5))
            .collect()
    }

    fn expect_ready(fetch: CandleFetch) -> CandleSeries {
        match fetch {
            CandleFetch::Ready(series) => series,
            CandleFetch::Unavailable(reason) => panic!("expected a series, got {}", reason),
        }
    }

    fn normalize_binance(rows: Vec<Value>, now: DateTime<Utc>) -> CandleFetch {
        normalize_klines(
            &Value::Array(rows),
            ExchangeFlavor::Binance,
            "BTCUSDT",
            TimeFrame::Minute5,
            now,
            50,
        )
    }

    #[test]
    fn test_binance_rows_become_oldest_first_series() {
        let now = t0() + chrono::Duration::minutes(5 * 60);
        let series = expect_ready(normalize_binance(five_minute_rows(60), now));

        assert_eq!(series.len(), 60);
        assert!(series.candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(!series.has_forming_tail());
    }

    #[test]
    fn test_forming_candle_is_flagged() {
        // Two minutes into the last bucket.
        let now = t0() + chrono::Duration::minutes(5 * 59 + 2);
        let series = expect_ready(normalize_binance(five_minute_rows(60), now));

        assert!(series.has_forming_tail());
        assert_eq!(series.confirmed().len(), 59);
    }

    #[test]
    fn test_bybit_newest_first_is_reversed() {
        let list: Vec<Value> = (0..60)
            .rev()
            .map(|i| {
                let open = t0() + chrono::Duration::minutes(i);
                let open_ms = open.timestamp_millis().to_string();
                json!([open_ms, "1", "2", "0.5", format!("{}", i), "3", "4"])
            })
            .collect();
        let payload = json!({"retCode": 0, "result": {"list": list}});
        let now = t0() + chrono::Duration::hours(2);
        let series = expect_ready(normalize_klines(
            &payload,
            ExchangeFlavor::Bybit,
            "ETHUSDT",
            TimeFrame::Minute1,
            now,
            50,
        ));

        assert_eq!(series.candles.first().unwrap().close, 0.0);
        assert_eq!(series.candles.last().unwrap().close, 59.0);
        assert!(series.candles.iter().all(|c| c.confirmed));
    }

    #[test]
    fn test_non_list_payload_is_unavailable() {
        let result = normalize_klines(
            &json!({"oops": true}),
            ExchangeFlavor::Binance,
            "X",
            TimeFrame::Minute5,
            t0(),
            50,
        );
        assert!(matches!(result, CandleFetch::Unavailable(Unavailable::NotAList)));
    }

    #[test]
    fn test_short_rows_and_short_history_are_unavailable() {
        let mut rows = five_minute_rows(49);
        rows.push(json!([1, "2", "3"]));
        let result = normalize_binance(rows, t0());
        match result {
            CandleFetch::Unavailable(Unavailable::TooShort { usable, required }) => {
                assert_eq!(usable, 49);
                assert_eq!(required, 50);
            }
            other => panic!("expected TooShort, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetcher_folds_router_exhaustion_into_unavailable() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(EngineError::Transport("refused".into())),
            Err(EngineError::Transport("refused".into())),
            Err(EngineError::Transport("refused".into())),
        ]));
        let pool = EndpointPool::new(vec!["https://a".into()]).unwrap();
        let router = Arc::new(FailoverRouter::new(pool, transport, 3, Duration::ZERO));
        let fetcher = CandleFetcher::new(router, ExchangeFlavor::Binance, 50);

        let result = fetcher.fetch("BTCUSDT", TimeFrame::Minute5, 200).await;
        assert!(matches!(result, CandleFetch::Unavailable(Unavailable::Request(_))));
    }
}
