// Endpoint fail-over router: rotates a pool of equivalent base URLs on
// transport errors, bad statuses and API-level error payloads.
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use super::exchange::{detect_api_error, Transport};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<String>,
    cursor: usize,
    consecutive_failures: u32,
}

impl EndpointPool {
    pub fn new(endpoints: Vec<String>) -> Result<Self> {
        let endpoints: Vec<String> = endpoints
            .into_iter()
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if endpoints.is_empty() {
            return Err(EngineError::ConfigError("endpoint pool cannot be empty".to_string()));
        }
        Ok(Self {
            endpoints,
            cursor: 0,
            consecutive_failures: 0,
        })
    }

    pub fn current(&self) -> &str {
        &self.endpoints[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Counts a failure against the endpoint at `attempted`. The cursor only
    /// moves if no concurrent request has rotated it away already.
    fn record_failure(&mut self, attempted: usize) -> u32 {
        if self.cursor == attempted {
            self.cursor = (self.cursor + 1) % self.endpoints.len();
        }
        self.consecutive_failures += 1;
        self.consecutive_failures
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }
}

pub struct FailoverRouter {
    pool: Mutex<EndpointPool>,
    transport: Arc<dyn Transport>,
    failure_budget: u32,
    backoff: Duration,
}

impl FailoverRouter {
    pub fn new(
        pool: EndpointPool,
        transport: Arc<dyn Transport>,
        failure_budget: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            pool: Mutex::new(pool),
            transport,
            failure_budget: failure_budget.max(1),
            backoff,
        }
    }

    // The pool is only ever mutated in short synchronous sections, so a
    // poisoned lock still holds a consistent value.
    fn lock_pool(&self) -> MutexGuard<'_, EndpointPool> {
        self.pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the pool state, for logging and inspection.
    pub fn snapshot(&self) -> EndpointPool {
        self.lock_pool().clone()
    }

    /// Performs one logical GET against the pool. The failure budget counts
    /// attempts across the whole pool, so a full rotation uses it up too.
    pub async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        let mut attempts: u32 = 0;

        loop {
            let (attempted, url) = {
                let pool = self.lock_pool();
                (pool.cursor(), format!("{}{}", pool.current(), path))
            };

            let outcome = match self.transport.get_json(&url, query).await {
                Ok(payload) => match detect_api_error(&payload) {
                    Some(msg) => Err(EngineError::ApiError(msg)),
                    None => Ok(payload),
                },
                Err(e) => Err(e),
            };

            let err = match outcome {
                Ok(payload) => {
                    self.lock_pool().record_success();
                    debug!(url = %url, "Exchange request succeeded");
                    return Ok(payload);
                }
                Err(err) if err.is_endpoint_fault() => err,
                Err(err) => return Err(err),
            };

            attempts += 1;
            let failures = self.lock_pool().record_failure(attempted);
            warn!(
                url = %url,
                attempt = attempts,
                budget = self.failure_budget,
                consecutive_failures = failures,
                error = %err,
                "Exchange request failed, rotating endpoint"
            );

            if attempts >= self.failure_budget {
                return Err(EngineError::EndpointsExhausted {
                    attempts,
                    path: path.to_string(),
                });
            }

            tokio::time::sleep(self.backoff).await;
        }
    }
}
