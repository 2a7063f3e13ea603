use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::models::{LatestAnswer, LatestAnswers, SymbolSources};

#[derive(Debug, Clone)]
struct CycleState {
    fetching: bool,
    last_refresh_time: Option<DateTime<Utc>>,
    latest_answers: Arc<LatestAnswers>,
}

/// Process-wide aggregation state. The configuration half is immutable; the
/// cycle half sits behind one lock and is written only by the refresh cycle,
/// always as a whole so readers never see two cycles mixed.
#[derive(Debug)]
pub struct AggregationState {
    symbol_sources: SymbolSources,
    heartbeat_interval: Duration,
    cycle: RwLock<CycleState>,
}

/// Consistent read-only copy of the state, as served to external callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateView {
    pub symbol_sources: SymbolSources,
    pub fetching: bool,
    pub last_refresh_time: Option<DateTime<Utc>>,
    pub heartbeat_interval_secs: u64,
    pub latest_answers: LatestAnswers,
}

impl AggregationState {
    pub fn new(symbol_sources: SymbolSources, heartbeat_interval: Duration) -> Self {
        let latest_answers = symbol_sources
            .keys()
            .map(|symbol| (symbol.clone(), None))
            .collect();

        AggregationState {
            symbol_sources,
            heartbeat_interval,
            cycle: RwLock::new(CycleState {
                fetching: false,
                last_refresh_time: None,
                latest_answers: Arc::new(latest_answers),
            }),
        }
    }

    pub fn symbol_sources(&self) -> &SymbolSources {
        &self.symbol_sources
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn is_fetching(&self) -> bool {
        self.read().fetching
    }

    pub fn last_refresh_time(&self) -> Option<DateTime<Utc>> {
        self.read().last_refresh_time
    }

    pub fn latest_answers(&self) -> Arc<LatestAnswers> {
        Arc::clone(&self.read().latest_answers)
    }

    /// `None` for a symbol that is not configured, `Some(None)` for one that
    /// has not been refreshed yet.
    pub fn latest_answer(&self, symbol: &str) -> Option<Option<LatestAnswer>> {
        self.read().latest_answers.get(symbol).cloned()
    }

    pub fn view(&self) -> StateView {
        let cycle = self.read();
        StateView {
            symbol_sources: self.symbol_sources.clone(),
            fetching: cycle.fetching,
            last_refresh_time: cycle.last_refresh_time,
            heartbeat_interval_secs: self.heartbeat_interval.as_secs(),
            latest_answers: (*cycle.latest_answers).clone(),
        }
    }

    /// Seeds answers loaded from storage. Symbols that are no longer configured
    /// are ignored. The refresh clock is left unset so the first tick refreshes.
    pub fn restore(&self, stored: LatestAnswers) {
        let mut cycle = self.write();
        let mut answers = (*cycle.latest_answers).clone();
        for (symbol, answer) in stored {
            if let Some(slot) = answers.get_mut(&symbol) {
                *slot = answer;
            }
        }
        cycle.latest_answers = Arc::new(answers);
    }

    /// Whether a cycle could start at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let cycle = self.read();
        !cycle.fetching && self.interval_elapsed(cycle.last_refresh_time, now)
    }

    /// Marks a cycle as in flight if none is running and the heartbeat interval
    /// has passed. The check and the flag flip happen under one write lock.
    pub fn try_begin_cycle(&self, now: DateTime<Utc>) -> Option<CycleGuard<'_>> {
        let mut cycle = self.write();
        if cycle.fetching || !self.interval_elapsed(cycle.last_refresh_time, now) {
            return None;
        }
        cycle.fetching = true;

        Some(CycleGuard {
            state: self,
            started_at: now,
            started: Instant::now(),
            finished: false,
        })
    }

    fn interval_elapsed(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last {
            None => true,
            // A clock that went backwards reads as "not yet".
            Some(last) => match (now - last).to_std() {
                Ok(elapsed) => elapsed >= self.heartbeat_interval,
                Err(_) => false,
            },
        }
    }

    fn finish_cycle(&self, answers: Option<LatestAnswers>, completed_at: DateTime<Utc>) {
        let mut cycle = self.write();
        if let Some(answers) = answers {
            cycle.latest_answers = Arc::new(answers);
        }
        cycle.last_refresh_time = Some(completed_at);
        cycle.fetching = false;
    }

    // The lock only guards plain assignments, so a poisoned lock still holds
    // a consistent value.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, CycleState> {
        self.cycle.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CycleState> {
        self.cycle.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof that a refresh cycle is in flight. Completing it publishes the new
/// answers; dropping it on any other path still clears `fetching` and stamps
/// the refresh time, so the poller can never stay stuck.
#[must_use = "dropping the guard ends the cycle immediately"]
pub struct CycleGuard<'a> {
    state: &'a AggregationState,
    started_at: DateTime<Utc>,
    started: Instant,
    finished: bool,
}

impl CycleGuard<'_> {
    /// Completion time on the caller's clock: the tick time plus wall time spent.
    fn completed_at(&self) -> DateTime<Utc> {
        let spent = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.started_at + spent
    }

    /// Replaces the whole answer snapshot and ends the cycle.
    pub fn complete(mut self, answers: LatestAnswers) -> DateTime<Utc> {
        let completed_at = self.completed_at();
        self.state.finish_cycle(Some(answers), completed_at);
        self.finished = true;
        completed_at
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.finish_cycle(None, self.completed_at());
        }
    }
}
