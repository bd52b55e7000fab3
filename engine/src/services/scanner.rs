// Scan cycle orchestrator: universe -> candles -> trend line -> signal state
// -> risk levels -> collaborators, once per cycle
use chrono::{DateTime, Utc};
use futures::future::FutureExt;
use futures::stream::{self, StreamExt};
use shared::models::{CandleSeries, SignalEvent, SignalMode};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::alert::AlertSink;
use super::schedule::CycleSchedule;
use super::signal_log::CsvSignalLog;
use crate::config::EngineSettings;
use crate::data::candles::{CandleFetch, CandleFetcher};
use crate::data::exchange::Transport;
use crate::data::failover::{EndpointPool, FailoverRouter};
use crate::data::universe::UniverseSelector;
use crate::error::{EngineError, Result};
use crate::indicators::{IndicatorCalculator, TrendLine};
use crate::signals::{RiskPolicy, SignalStateMachine, SymbolState, TrendTail};

#[derive(Debug, Default, Clone)]
pub struct CycleReport {
    pub symbols: usize,
    pub unavailable: usize,
    pub insufficient: usize,
    pub events: Vec<SignalEvent>,
}

pub struct Scanner {
    settings: EngineSettings,
    router: Arc<FailoverRouter>,
    universe: UniverseSelector,
    fetcher: CandleFetcher,
    trend: TrendLine,
    risk: RiskPolicy,
    // One independent state machine per enabled mode.
    machines: Vec<SignalStateMachine>,
    alerts: Arc<dyn AlertSink>,
    signal_log: Option<CsvSignalLog>,
    schedule: CycleSchedule,
    last_heartbeat: Instant,
    cycles: u64,
}

impl Scanner {
    pub fn new(
        settings: EngineSettings,
        transport: Arc<dyn Transport>,
        alerts: Arc<dyn AlertSink>,
        signal_log: Option<CsvSignalLog>,
    ) -> Result<Self> {
        settings.validate()?;

        let pool = EndpointPool::new(settings.endpoints.clone())?;
        let router = Arc::new(FailoverRouter::new(
            pool,
            transport,
            settings.failover_budget,
            settings.failover_backoff(),
        ));
        let universe = UniverseSelector::new(
            router.clone(),
            settings.exchange,
            settings.quote_suffix.clone(),
            settings.universe_size,
        );
        let fetcher = CandleFetcher::new(router.clone(), settings.exchange, settings.min_candles);

        let trend = TrendLine::new(settings.trend_params());

        let mut machines: Vec<SignalStateMachine> = Vec::new();
        for mode in &settings.signal_modes {
            if !machines.iter().any(|m| m.mode() == *mode) {
                machines.push(SignalStateMachine::new(*mode));
            }
        }

        let schedule = if settings.align_to_candle_close {
            CycleSchedule::CandleClose {
                timeframe: settings.timeframe,
                grace: Duration::from_secs(settings.close_grace_secs),
            }
        } else {
            CycleSchedule::Fixed(Duration::from_secs(settings.scan_interval_secs))
        };

        Ok(Self {
            risk: settings.risk(),
            settings,
            router,
            universe,
            fetcher,
            trend,
            machines,
            alerts,
            signal_log,
            schedule,
            last_heartbeat: Instant::now(),
            cycles: 0,
        })
    }

    pub fn state(&self, mode: SignalMode, symbol: &str) -> Option<&SymbolState> {
        self.machines
            .iter()
            .find(|m| m.mode() == mode)
            .and_then(|m| m.state(symbol))
    }

    /// One pass over the universe.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycles += 1;
        let span = info_span!("scan_cycle", cycle = self.cycles);
        self.scan().instrument(span).await
    }

    async fn scan(&mut self) -> Result<CycleReport> {
        let symbols = self.universe.top_symbols().await;
        let mut report = CycleReport {
            symbols: symbols.len(),
            ..Default::default()
        };
        if symbols.is_empty() {
            warn!("No symbols to scan this cycle");
            return Ok(report);
        }

        // Fetches may overlap; evaluation below stays sequential so each
        // symbol's state commit happens alone.
        let timeframe = self.settings.timeframe;
        let limit = self.settings.candle_limit;
        let fetcher = &self.fetcher;
        let fetched: Vec<(String, CandleFetch)> = stream::iter(symbols)
            .map(|symbol| async move {
                let fetch = fetcher.fetch(&symbol, timeframe, limit).await;
                (symbol, fetch)
            })
            .buffered(self.settings.max_concurrency)
            .collect()
            .await;

        for (symbol, fetch) in fetched {
            let series = match fetch {
                CandleFetch::Ready(series) => series,
                CandleFetch::Unavailable(reason) => {
                    warn!(
                        symbol = %symbol,
                        reason = %reason,
                        "Candles unavailable, skipping symbol"
                    );
                    report.unavailable += 1;
                    continue;
                }
            };

            let events = self.evaluate(&series, Utc::now(), &mut report)?;
            for event in events {
                self.publish(&event).await;
                report.events.push(event);
            }
        }

        let pool = self.router.snapshot();
        info!(
            symbols = report.symbols,
            unavailable = report.unavailable,
            insufficient = report.insufficient,
            emitted = report.events.len(),
            endpoint = %pool.current(),
            consecutive_failures = pool.consecutive_failures(),
            "Scan cycle finished"
        );
        Ok(report)
    }

    fn evaluate(
        &mut self,
        series: &CandleSeries,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<Vec<SignalEvent>> {
        let mut events = Vec::new();
        let mut undefined = false;

        for machine in self.machines.iter_mut() {
            let mode = machine.mode();
            let candles = match mode {
                SignalMode::Early => series.candles.as_slice(),
                SignalMode::Confirmed => series.confirmed(),
            };

            let trend = self.trend.calculate(candles);
            if trend.len() != candles.len() {
                return Err(EngineError::IndicatorError(format!(
                    "{} produced {} values for {} candles of {}",
                    self.trend.name(),
                    trend.len(),
                    candles.len(),
                    series.symbol
                )));
            }
            if TrendTail::from_series(&trend).is_none() {
                undefined = true;
                continue;
            }

            let Some(transition) = machine.observe(&series.symbol, &trend, now) else {
                continue;
            };
            let Some(last) = candles.last() else {
                continue;
            };

            let entry_price = last.close;
            events.push(SignalEvent {
                id: Uuid::new_v4().to_string(),
                symbol: series.symbol.clone(),
                direction: transition.direction,
                mode,
                entry_price,
                trend_value: transition.tail.c,
                strength: transition.strength,
                timestamp: now,
                candle_time: last.timestamp,
                risk: self.risk.levels(transition.direction, entry_price, candles),
            });
        }

        if undefined {
            debug!(
                symbol = %series.symbol,
                candles = series.len(),
                "Trend line undefined at tail, symbol skipped"
            );
            report.insufficient += 1;
        }
        Ok(events)
    }

    // State is already committed here; collaborator failures are only logged.
    async fn publish(&self, event: &SignalEvent) {
        info!(
            id = %event.id,
            symbol = %event.symbol,
            direction = %event.direction,
            mode = %event.mode,
            price = event.entry_price,
            strength = event.strength,
            stop_loss = ?event.risk.map(|r| r.stop_loss),
            take_profit = ?event.risk.map(|r| r.take_profit),
            "Signal emitted"
        );

        if let Some(log) = &self.signal_log {
            if let Err(e) = log.append(event) {
                error!(path = %log.path().display(), error = %e, "Failed to append signal log");
            }
        }
        if let Err(e) = self.alerts.deliver(event).await {
            warn!(symbol = %event.symbol, error = %e, "Alert delivery failed");
        }
    }

    async fn announce(&self, text: &str) {
        if let Err(e) = self.alerts.notify(text).await {
            warn!(error = %e, "Notice delivery failed");
        }
    }

    async fn heartbeat_if_due(&mut self) {
        let minutes = self.settings.heartbeat_minutes;
        if minutes == 0 || self.last_heartbeat.elapsed() < Duration::from_secs(minutes * 60) {
            return;
        }
        self.announce("Scanner alive (heartbeat)").await;
        self.last_heartbeat = Instant::now();
    }

    /// Runs cycles until `shutdown` flips (or its sender goes away). A failed
    /// or panicking cycle is logged and followed by the fault backoff.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>, once: bool) {
        let modes: Vec<&str> = self.machines.iter().map(|m| m.mode().as_str()).collect();
        info!(
            timeframe = %self.settings.timeframe,
            universe = self.settings.universe_size,
            modes = ?modes,
            trend = %self.trend.name(),
            params = %self.trend.parameters(),
            "Scanner started"
        );
        self.announce(&format!(
            "Scanner started\nTimeframe: {}\nModes: {}",
            self.settings.timeframe,
            modes.join(", ")
        ))
        .await;

        let fault_backoff = Duration::from_secs(self.settings.fault_backoff_secs);
        loop {
            let cycle = AssertUnwindSafe(self.run_cycle()).catch_unwind();
            let outcome = tokio::select! {
                outcome = cycle => Some(outcome),
                _ = shutdown.changed() => None,
            };

            let delay = match outcome {
                None => {
                    info!("Shutdown requested, abandoning in-flight cycle");
                    break;
                }
                Some(Ok(Ok(_report))) => {
                    self.heartbeat_if_due().await;
                    self.schedule.delay_from(Utc::now())
                }
                Some(Ok(Err(e))) => {
                    error!(error = %e, "Scan cycle failed");
                    fault_backoff
                }
                Some(Err(panic)) => {
                    error!(panic = %panic_message(&panic), "Scan cycle panicked");
                    fault_backoff
                }
            };

            if once {
                break;
            }
            debug!(delay_secs = delay.as_secs_f64(), "Sleeping until next cycle");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.announce("Scanner stopped").await;
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
