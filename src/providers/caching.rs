//! Rate lookup client: TTL cache, single-flight coalescing and a bounded
//! wait in front of an external [`CurrencyRateProvider`].

use crate::core::cache::Cache;
use crate::core::currency::CurrencyRateProvider;
use crate::core::error::{LedgerError, Result};
use crate::store::memory::MemoryCache;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const DEFAULT_RATE_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RatePair {
    pub from: String,
    pub to: String,
}

impl Display for RatePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

type SharedLookup = Shared<BoxFuture<'static, Result<Decimal>>>;
type InFlight = Arc<Mutex<HashMap<RatePair, SharedLookup>>>;

/// Caching rate client.
///
/// Successful rates are cached per (from, to) pair for the TTL; failures are
/// never cached and nothing older than the TTL is ever served. While a lookup
/// for a pair is running, every other caller for that pair awaits the same
/// lookup instead of issuing its own.
pub struct RateLookupClient {
    source: Arc<dyn CurrencyRateProvider>,
    cache: Arc<dyn Cache<RatePair, Decimal>>,
    in_flight: InFlight,
    ttl: Duration,
    timeout: Duration,
}

impl RateLookupClient {
    pub fn new(source: Arc<dyn CurrencyRateProvider>) -> Self {
        Self::with_cache(source, Arc::new(MemoryCache::<RatePair, Decimal>::new()))
    }

    pub fn with_cache(
        source: Arc<dyn CurrencyRateProvider>,
        cache: Arc<dyn Cache<RatePair, Decimal>>,
    ) -> Self {
        Self {
            source,
            cache,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            ttl: DEFAULT_RATE_TTL,
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Starts the external lookup on its own task so it completes (and
    /// clears its in-flight slot) even if every waiter goes away.
    fn start_lookup(&self, pair: RatePair) -> SharedLookup {
        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let ttl = self.ttl;
        let timeout = self.timeout;
        let task_pair = pair.clone();

        let task = tokio::spawn(async move {
            let pair = task_pair;
            let result =
                match tokio::time::timeout(timeout, source.get_rate(&pair.from, &pair.to)).await {
                    Ok(Ok(rate)) => Ok(rate),
                    Ok(Err(err @ LedgerError::RateUnavailable { .. })) => Err(err),
                    Ok(Err(other)) => Err(LedgerError::rate_unavailable(
                        &pair.from,
                        &pair.to,
                        other.to_string(),
                    )),
                    Err(_) => Err(LedgerError::rate_unavailable(
                        &pair.from,
                        &pair.to,
                        format!("lookup timed out after {timeout:?}"),
                    )),
                };

            match &result {
                Ok(rate) => cache.put(pair.clone(), *rate, Some(ttl)).await,
                Err(err) => warn!(%pair, "Rate lookup failed: {}", err),
            }
            // Cache is filled before the slot is released so late callers
            // find the rate under the in-flight lock.
            in_flight.lock().await.remove(&pair);
            result
        });

        async move {
            task.await.unwrap_or_else(|join_err| {
                Err(LedgerError::rate_unavailable(
                    &pair.from,
                    &pair.to,
                    format!("lookup task failed: {join_err}"),
                ))
            })
        }
        .boxed()
        .shared()
    }
}

#[async_trait]
impl CurrencyRateProvider for RateLookupClient {
    async fn get_rate(&self, from: &str, to: &str) -> Result<Decimal> {
        let pair = RatePair {
            from: from.trim().to_ascii_uppercase(),
            to: to.trim().to_ascii_uppercase(),
        };
        if pair.from == pair.to {
            return Ok(Decimal::ONE);
        }

        if let Some(rate) = self.cache.get(&pair).await {
            return Ok(rate);
        }

        let lookup = {
            let mut in_flight = self.in_flight.lock().await;
            // A lookup may have landed between the cache check and the lock.
            if let Some(rate) = self.cache.get(&pair).await {
                return Ok(rate);
            }
            match in_flight.get(&pair) {
                Some(existing) => {
                    debug!(%pair, "Joining in-flight rate lookup");
                    existing.clone()
                }
                None => {
                    debug!(%pair, "Starting rate lookup");
                    let lookup = self.start_lookup(pair.clone());
                    in_flight.insert(pair, lookup.clone());
                    lookup
                }
            }
        };

        lookup.await
    }
}
