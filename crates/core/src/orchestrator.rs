use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt as _;
use serde::{Deserialize, Serialize};
use tokio::{task::JoinSet, time::Instant};
use tracing::{debug, error, instrument, warn};

use crate::provider::{QuoteProvider, QuoteRequest, QuoteResult, STATUS_INTERNAL};

/// Results of one fan-out, in provider dispatch order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteSet {
    results: Vec<QuoteResult>,
}

impl QuoteSet {
    pub fn get(&self, provider: &str) -> Option<&QuoteResult> {
        self.results.iter().find(|r| r.provider == provider)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuoteResult> {
        self.results.iter()
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|r| r.provider.as_str())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_results(self) -> Vec<QuoteResult> {
        self.results
    }
}

impl FromIterator<QuoteResult> for QuoteSet {
    fn from_iter<I: IntoIterator<Item = QuoteResult>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

/// Fans a quote request out to every provider supporting its chain.
#[derive(Debug, Clone)]
pub struct QuoteOrchestrator {
    call_timeout: Duration,
}

impl QuoteOrchestrator {
    pub fn new(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }

    /// Waits for every dispatched provider and returns exactly one result each.
    ///
    /// A call exceeding the timeout is recorded as a 408, a panicking adapter as
    /// a 500. Dropping the returned future aborts the in-flight calls.
    #[instrument(skip_all, fields(chain.id = %request.chain, input = %request.input.symbol, output = %request.output.symbol))]
    pub async fn quote_all(
        &self,
        providers: &[Arc<dyn QuoteProvider>],
        request: QuoteRequest,
    ) -> QuoteSet {
        let dispatched: Vec<Arc<dyn QuoteProvider>> = providers
            .iter()
            .filter(|p| p.supports_chain(&request.chain))
            .cloned()
            .collect();

        if dispatched.is_empty() {
            warn!("No provider supports chain");
            return QuoteSet::default();
        }

        let request = Arc::new(request);
        let mut tasks = JoinSet::new();
        for (idx, provider) in dispatched.iter().enumerate() {
            let provider = Arc::clone(provider);
            let request = Arc::clone(&request);
            let call_timeout = self.call_timeout;

            tasks.spawn(async move {
                let started = Instant::now();
                let call = AssertUnwindSafe(provider.get_quote(&request)).catch_unwind();
                let result = match tokio::time::timeout(call_timeout, call).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => {
                        error!(provider = provider.name(), "Provider panicked while quoting");
                        QuoteResult::failed(
                            provider.name(),
                            STATUS_INTERNAL,
                            "Unexpected error: provider panicked",
                            started.elapsed(),
                        )
                    }
                    Err(_) => QuoteResult::timed_out(provider.name(), started.elapsed()),
                };
                (idx, result)
            });
        }

        let mut slots: Vec<Option<QuoteResult>> = vec![None; dispatched.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => {
                    debug!(
                        provider = %result.provider,
                        status = result.status_code,
                        elapsed = %humantime::format_duration(result.elapsed),
                        "Provider settled"
                    );
                    slots[idx] = Some(result);
                }
                Err(e) => error!(error = %e, "Quote task failed to join"),
            }
        }

        slots
            .into_iter()
            .zip(&dispatched)
            .map(|(slot, provider)| {
                slot.unwrap_or_else(|| {
                    QuoteResult::failed(provider.name(), STATUS_INTERNAL, "Quote task failed", Duration::ZERO)
                })
            })
            .collect()
    }
}
