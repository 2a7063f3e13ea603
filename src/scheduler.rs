use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::consensus::compute_latest_answer;
use crate::models::{LatestAnswer, LatestAnswers, SymbolSource, SymbolSources};
use crate::pipeline::decode_answers;
use crate::rpc::{fetch_symbol, FetchOptions, Transport};
use crate::state::AggregationState;
use crate::store::AnswerStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A cycle is already running or the heartbeat interval has not passed.
    Skipped,
    Refreshed { completed_at: DateTime<Utc> },
}

/// Fetch, decode and vote on one symbol. Transport errors come first in the
/// error list, then pipeline errors, each in provider order.
pub async fn refresh_symbol(
    transport: &dyn Transport,
    symbol: &str,
    source: &SymbolSource,
    options: &FetchOptions,
) -> LatestAnswer {
    let fetch = fetch_symbol(transport, symbol, source, options).await;
    let (decoded, pipeline_errors) = decode_answers(symbol, &fetch.successes);

    let mut errors = fetch.errors;
    errors.extend(pipeline_errors);
    let answers = decoded.into_iter().map(|d| d.answer).collect();

    let latest = compute_latest_answer(answers, errors, source.provider.threshold, Utc::now());
    info!(
        symbol = %symbol,
        answers = latest.answers.len(),
        errors = latest.errors.len(),
        consensus = latest.consensus,
        heaviest_answer = ?latest.heaviest_answer,
        "symbol refreshed"
    );
    latest
}

/// One refresh cycle over every symbol, in symbol order. Never fails: a
/// symbol whose providers all failed still gets an answer carrying the errors.
pub async fn refresh_all(
    transport: &dyn Transport,
    sources: &SymbolSources,
    options: &FetchOptions,
) -> LatestAnswers {
    let mut latest = LatestAnswers::new();
    for (symbol, source) in sources {
        let answer = refresh_symbol(transport, symbol, source, options).await;
        latest.insert(symbol.clone(), Some(answer));
    }
    latest
}

pub struct Scheduler {
    state: Arc<AggregationState>,
    transport: Arc<dyn Transport>,
    options: FetchOptions,
    store: Option<Arc<dyn AnswerStore>>,
}

impl Scheduler {
    pub fn new(
        state: Arc<AggregationState>,
        transport: Arc<dyn Transport>,
        options: FetchOptions,
    ) -> Self {
        Scheduler {
            state,
            transport,
            options,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn AnswerStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn state(&self) -> &Arc<AggregationState> {
        &self.state
    }

    /// Handles one timer tick. Starts a cycle only when none is in flight and
    /// the heartbeat interval has passed; otherwise leaves the state untouched.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        let Some(guard) = self.state.try_begin_cycle(now) else {
            debug!("refresh not due");
            return TickOutcome::Skipped;
        };

        let cycle_id = Uuid::new_v4();
        let span = info_span!("refresh_cycle", %cycle_id);
        info!(parent: &span, symbols = self.state.symbol_sources().len(), "refresh cycle started");

        let answers = refresh_all(
            self.transport.as_ref(),
            self.state.symbol_sources(),
            &self.options,
        )
        .instrument(span.clone())
        .await;

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&answers) {
                warn!(parent: &span, error = %e, "failed to persist latest answers");
            }
        }

        let completed_at = guard.complete(answers);
        info!(parent: &span, %completed_at, "refresh cycle finished");
        TickOutcome::Refreshed { completed_at }
    }

    /// Drives `tick` forever. Each tick's cycle is awaited before the next tick
    /// is taken, so cycles never overlap; ticks missed meanwhile are dropped.
    pub async fn run(self, tick_every: Duration) {
        let mut ticker = tokio::time::interval(tick_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            tick_secs = tick_every.as_secs(),
            heartbeat_secs = self.state.heartbeat_interval().as_secs(),
            "scheduler started"
        );

        loop {
            ticker.tick().await;
            self.tick(Utc::now()).await;
        }
    }
}
