use crate::clock::Clock;
use crate::error::Result;
use crate::ledger::{ApplicationHandle, Request};
use crate::round::guard::{TransitionGuard, TransitionOutcome};
use crate::round::{Round, RoundProgram, SyncHandle, Viewer};
use crate::task::TaskHandle;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// How often the deadline is re-checked between polls.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// What a synchronizer currently believes about its round.
pub struct SyncView<G: RoundProgram> {
    pub state: Option<Round<G>>,
    pub presentation: G::Presentation,
    pub time_left: Option<Duration>,
    pub has_fetched: bool,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl<G: RoundProgram> Default for SyncView<G> {
    fn default() -> Self {
        Self {
            state: None,
            presentation: G::Presentation::default(),
            time_left: None,
            has_fetched: false,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

impl<G: RoundProgram> Clone for SyncView<G> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            presentation: self.presentation.clone(),
            time_left: self.time_left,
            has_fetched: self.has_fetched,
            consecutive_failures: self.consecutive_failures,
            last_error: self.last_error.clone(),
        }
    }
}

impl<G: RoundProgram> std::fmt::Debug for SyncView<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncView")
            .field("state", &self.state)
            .field("presentation", &self.presentation)
            .field("time_left", &self.time_left)
            .field("has_fetched", &self.has_fetched)
            .field("consecutive_failures", &self.consecutive_failures)
            .finish()
    }
}

struct Applied<G: RoundProgram> {
    seq: u64,
    view: SyncView<G>,
}

/// Keeps a local copy of one round in step with its authority chain and
/// pushes the round forward when a phase deadline has passed.
pub struct RoundSynchronizer<G: RoundProgram> {
    id: Uuid,
    program: Arc<G>,
    app: ApplicationHandle,
    viewer: Viewer,
    clock: Arc<dyn Clock>,
    guard: TransitionGuard,
    grace: Duration,
    next_seq: AtomicU64,
    applied: RwLock<Applied<G>>,
}

impl<G: RoundProgram> RoundSynchronizer<G> {
    pub fn new(
        program: Arc<G>,
        app: ApplicationHandle,
        clock: Arc<dyn Clock>,
        cooldown: Duration,
        grace: Duration,
    ) -> Self {
        let viewer = Viewer::of(&app);
        let guard = TransitionGuard::new(clock.clone(), cooldown);
        Self {
            id: Uuid::new_v4(),
            program,
            app,
            viewer,
            clock,
            guard,
            grace,
            next_seq: AtomicU64::new(0),
            applied: RwLock::new(Applied {
                seq: 0,
                view: SyncView::default(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn program(&self) -> &G {
        &self.program
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn guard(&self) -> &TransitionGuard {
        &self.guard
    }

    pub fn app(&self) -> &ApplicationHandle {
        &self.app
    }

    /// Current view, with the countdown computed against the clock.
    pub fn view(&self) -> SyncView<G> {
        let now = self.clock.now();
        let mut view = self.applied.read().view.clone();
        view.time_left = view.state.as_ref().and_then(|s| s.remaining(now));
        view
    }

    /// Fetches the round, applies it unless a newer poll already landed and
    /// checks the phase deadline.
    pub async fn poll(&self) -> Result<SyncView<G>> {
        let seq = self.begin_poll();

        match self.fetch().await {
            Ok(state) => {
                if !self.apply(seq, state) {
                    tracing::debug!("[{}] Discarding stale poll #{}", self.id, seq);
                }
            }
            Err(e) => {
                let failures = {
                    let mut applied = self.applied.write();
                    applied.view.consecutive_failures += 1;
                    applied.view.last_error = Some(e.to_string());
                    applied.view.consecutive_failures
                };
                tracing::warn!(
                    "{} poll failed ({} in a row): {}",
                    self.program.name(),
                    failures,
                    e
                );
                return Err(e);
            }
        }

        self.check_deadline().await;
        Ok(self.view())
    }

    /// Deadline check between polls, no fetch.
    pub async fn tick(&self) -> Option<TransitionOutcome> {
        self.check_deadline().await
    }

    /// Forgets the round, e.g. after leaving it. Polls already in flight
    /// are discarded when they land.
    pub fn invalidate(&self) {
        let seq = self.begin_poll();
        let mut applied = self.applied.write();
        applied.seq = applied.seq.max(seq);
        applied.view = SyncView::default();
        tracing::debug!("[{}] {} view invalidated", self.id, self.program.name());
    }

    /// Submits a player action as the viewer, then re-polls.
    pub async fn submit(&self, request: &Request) -> Result<Value> {
        tracing::info!(
            "Submitting {} to {}",
            request.operation_name(),
            self.program.name()
        );
        let data = self.app.mutate(request).await?;

        if let Err(e) = self.poll().await {
            tracing::debug!("Refresh after {} failed: {}", request.operation_name(), e);
        }
        Ok(data)
    }

    /// Pushes the round forward on request. Shares the guard with the
    /// deadline check, so it is suppressed while an automatic transition
    /// is cooling down.
    pub async fn transition(&self, request: &Request) -> TransitionOutcome {
        let outcome = self
            .guard
            .try_transition(request.operation_name(), || self.app.mutate(request))
            .await;

        if outcome == TransitionOutcome::Submitted {
            if let Err(e) = self.poll().await {
                tracing::debug!("Refresh after {} failed: {}", request.operation_name(), e);
            }
        }
        outcome
    }

    /// Runs the poll loop and the deadline ticker until the handle is
    /// dropped.
    pub fn spawn(self: &Arc<Self>) -> SyncHandle {
        let this = Arc::clone(self);
        let period = self.program.poll_interval();
        let name = format!("{} synchronizer {}", self.program.name(), self.id);

        let handle = tokio::spawn(async move {
            let mut polls = tokio::time::interval(period);
            polls.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks = tokio::time::interval(TICK_INTERVAL);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = polls.tick() => {
                        // Failures are already counted and logged.
                        let _ = this.poll().await;
                    }
                    _ = ticks.tick() => {
                        this.tick().await;
                    }
                }
            }
        });

        TaskHandle::new(name, handle)
    }

    fn begin_poll(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn fetch(&self) -> Result<Option<Round<G>>> {
        let request = self.program.state_query();
        let viewer_chain = &self.viewer.chain_id;

        let data = self.app.query(&request).await?;
        let local = match self.program.decode(&data, viewer_chain)? {
            Some(local) => local,
            None => return Ok(None),
        };

        if &local.authority_chain_id == viewer_chain {
            return Ok(Some(local));
        }

        let authority = local.authority_chain_id.clone();
        let remote = match self.app.query_on(&authority, &request).await {
            Ok(data) => self.program.decode(&data, viewer_chain),
            Err(e) => Err(e),
        };

        match remote {
            Ok(remote) => Ok(remote),
            Err(e) => {
                tracing::warn!("Failed to poll authority chain {}: {}", authority, e);
                let previous = self
                    .applied
                    .read()
                    .view
                    .state
                    .clone()
                    .filter(|s| s.authority_chain_id == authority);
                Ok(Some(previous.unwrap_or(local)))
            }
        }
    }

    fn apply(&self, seq: u64, state: Option<Round<G>>) -> bool {
        let mut applied = self.applied.write();
        if seq < applied.seq {
            return false;
        }

        if let Some(state) = &state {
            tracing::debug!(
                "[{}] Round {} | Phase: {:?} | Elapsed: {:.2}s",
                self.id,
                state.round_id,
                state.phase,
                state.elapsed(self.clock.now()).as_secs_f64()
            );
        }

        let presentation =
            self.program
                .present(state.as_ref(), &applied.view.presentation, &self.viewer);
        applied.seq = seq;
        applied.view = SyncView {
            state,
            presentation,
            time_left: None,
            has_fetched: true,
            consecutive_failures: 0,
            last_error: None,
        };
        true
    }

    async fn check_deadline(&self) -> Option<TransitionOutcome> {
        let now = self.clock.now();
        let (request, round_id, elapsed) = {
            let applied = self.applied.read();
            let state = applied.view.state.as_ref()?;
            if !state.is_overdue(now, self.grace) {
                return None;
            }
            let request = self.program.transition(state)?;
            (request, state.round_id, state.elapsed(now))
        };

        tracing::debug!(
            "Round {} exceeded its deadline ({:.2}s elapsed)",
            round_id,
            elapsed.as_secs_f64()
        );
        let outcome = self
            .guard
            .try_transition(request.operation_name(), || self.app.mutate(&request))
            .await;
        Some(outcome)
    }
}
