// Symbol universe: top-N quote-volume pairs for one quote currency
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

use super::exchange::{value_as_f64, ExchangeFlavor};
use super::failover::FailoverRouter;

/// Ranks a ticker list by descending quote volume and keeps the top `limit`
/// symbols ending in `quote_suffix`. Anything that is not a list, and entries
/// without a symbol or a numeric volume, are dropped rather than reported.
pub fn select_top_symbols(
    tickers: &Value,
    volume_field: &str,
    quote_suffix: &str,
    limit: usize,
) -> Vec<String> {
    let Some(entries) = tickers.as_array() else {
        return Vec::new();
    };

    let mut ranked: Vec<(&str, f64)> = entries
        .iter()
        .filter_map(|entry| {
            let symbol = entry.get("symbol")?.as_str()?;
            if !symbol.ends_with(quote_suffix) {
                return None;
            }
            let volume = value_as_f64(entry.get(volume_field)?)?;
            Some((symbol, volume))
        })
        .collect();

    // Stable: equal volumes keep payload order.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    ranked
        .into_iter()
        .take(limit)
        .map(|(symbol, _)| symbol.to_string())
        .collect()
}

pub struct UniverseSelector {
    router: Arc<FailoverRouter>,
    flavor: ExchangeFlavor,
    quote_suffix: String,
    size: usize,
}

impl UniverseSelector {
    pub fn new(
        router: Arc<FailoverRouter>,
        flavor: ExchangeFlavor,
        quote_suffix: impl Into<String>,
        size: usize,
    ) -> Self {
        Self {
            router,
            flavor,
            quote_suffix: quote_suffix.into(),
            size,
        }
    }

    /// Current universe. An unreachable exchange yields an empty list.
    pub async fn top_symbols(&self) -> Vec<String> {
        let (path, query) = self.flavor.ticker_request();
        let payload = match self.router.get_json(path, &query).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Ticker statistics unavailable, universe is empty this cycle");
                return Vec::new();
            }
        };

        let symbols = select_top_symbols(
            self.flavor.ticker_list(&payload),
            self.flavor.volume_field(),
            &self.quote_suffix,
            self.size,
        );
        debug!(count = symbols.len(), "Universe selected");
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::failover::tests::ScriptedTransport;
    use crate::data::failover::EndpointPool;
    use crate::error::EngineError;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_ranks_by_quote_volume() {
        let tickers = json!([
            {"symbol": "ETHUSDT", "quoteVolume": "500.0"},
            {"symbol": "BTCUSDT", "quoteVolume": "900.5"},
            {"symbol": "ETHBTC", "quoteVolume": "99999"},
            {"symbol": "SOLUSDT", "quoteVolume": 700},
            {"symbol": "XRPUSDT", "quoteVolume": "100"},
        ]);
        let top = select_top_symbols(&tickers, "quoteVolume", "USDT", 3);
        assert_eq!(top, vec!["BTCUSDT", "SOLUSDT", "ETHUSDT"]);
    }

    #[test]
    fn test_object_payload_yields_empty_list() {
        let payload = json!({"code": 0, "data": []});
        assert!(select_top_symbols(&payload, "quoteVolume", "USDT", 25).is_empty());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let tickers = json!([
            {"symbol": "BTCUSDT"},
            {"symbol": "ETHUSDT", "quoteVolume": "n/a"},
            {"quoteVolume": "10"},
            {"symbol": 42, "quoteVolume": "10"},
            "garbage",
            {"symbol": "SOLUSDT", "quoteVolume": "10"},
        ]);
        assert_eq!(select_top_symbols(&tickers, "quoteVolume", "USDT", 25), vec!["SOLUSDT"]);
    }

    #[test]
    fn test_limit_bounds_result() {
        let tickers: Vec<Value> = (0..40)
            .map(|i| json!({"symbol": format!("C{}USDT", i), "quoteVolume": i.to_string()}))
            .collect();
        let top = select_top_symbols(&Value::Array(tickers), "quoteVolume", "USDT", 25);
        assert_eq!(top.len(), 25);
        assert_eq!(top[0], "C39USDT");
    }

    #[tokio::test]
    async fn test_selector_reads_bybit_nested_list() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": {"list": [
                {"symbol": "BTCUSDT", "turnover24h": "10"},
                {"symbol": "ETHUSDT", "turnover24h": "20"}
            ]}
        }))]));
        let pool = EndpointPool::new(vec!["https://api.bybit.com".into()]).unwrap();
        let router = Arc::new(FailoverRouter::new(pool, transport, 3, Duration::ZERO));
        let selector = UniverseSelector::new(router, ExchangeFlavor::Bybit, "USDT", 25);

        assert_eq!(selector.top_symbols().await, vec!["ETHUSDT", "BTCUSDT"]);
    }

    #[tokio::test]
    async fn test_selector_degrades_to_empty_when_exhausted() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(EngineError::Transport("down".into())),
            Err(EngineError::Transport("down".into())),
        ]));
        let pool = EndpointPool::new(vec!["https://a".into(), "https://b".into()]).unwrap();
        let router = Arc::new(FailoverRouter::new(pool, transport, 2, Duration::ZERO));
        let selector = UniverseSelector::new(router, ExchangeFlavor::Binance, "USDT", 25);

        assert!(selector.top_symbols().await.is_empty());
    }
}
