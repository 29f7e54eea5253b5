pub mod guard;
pub mod synchronizer;

pub use guard::{TransitionGuard, TransitionOutcome};
pub use synchronizer::{RoundSynchronizer, SyncView};

use crate::error::Result;
use crate::ledger::{ApplicationHandle, Request};
use crate::types::{Address, ChainId, Timestamp};
use serde_json::Value;
use std::fmt::Debug;
use std::time::Duration;

/// Handle returned by [`RoundSynchronizer::spawn`].
pub type SyncHandle = crate::task::TaskHandle;

/// Extra time a phase may overrun before anyone forces it forward.
pub const DEFAULT_DEADLINE_GRACE: Duration = Duration::from_secs(2);

pub trait RoundPhase: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// `None` for phases that end on a player action instead of a deadline.
    fn nominal_duration(&self) -> Option<Duration>;
}

/// Canonical state of one round as read from its authority chain.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundState<P, D> {
    pub round_id: u64,
    pub phase: P,
    pub start_time: Timestamp,
    pub authority_chain_id: ChainId,
    pub payload: D,
}

impl<P: RoundPhase, D> RoundState<P, D> {
    pub fn elapsed(&self, now: Timestamp) -> Duration {
        now.duration_since(self.start_time)
    }

    pub fn remaining(&self, now: Timestamp) -> Option<Duration> {
        let nominal = self.phase.nominal_duration()?;
        Some(nominal.saturating_sub(self.elapsed(now)))
    }

    /// True once the phase has run strictly longer than its nominal
    /// duration plus `grace`.
    pub fn is_overdue(&self, now: Timestamp, grace: Duration) -> bool {
        match self.phase.nominal_duration() {
            Some(nominal) => self.elapsed(now) > nominal + grace,
            None => false,
        }
    }
}

/// Who is looking at the round: the local chain and the owner that signs
/// the viewer's actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub chain_id: ChainId,
    pub owner: Address,
}

impl Viewer {
    pub fn of(app: &ApplicationHandle) -> Self {
        Self {
            chain_id: app.chain_id().clone(),
            owner: app.owner().clone(),
        }
    }
}

pub type Round<G> = RoundState<<G as RoundProgram>::Phase, <G as RoundProgram>::Payload>;

/// Game-specific half of round reconciliation.
pub trait RoundProgram: Send + Sync + 'static {
    type Phase: RoundPhase;
    type Payload: Clone + Debug + Send + Sync + 'static;
    /// Derived, display-only state.
    type Presentation: Clone + Debug + Default + Send + Sync + 'static;

    fn name(&self) -> &str;

    fn poll_interval(&self) -> Duration;

    fn state_query(&self) -> Request;

    /// Decodes a state query response. `Ok(None)` means there is no round
    /// for this viewer. A round that does not name its authority belongs
    /// to `viewer`.
    fn decode(&self, data: &Value, viewer: &ChainId) -> Result<Option<Round<Self>>>
    where
        Self: Sized;

    /// The mutation that moves `state` out of its current phase, if any.
    fn transition(&self, state: &Round<Self>) -> Option<Request>
    where
        Self: Sized;

    fn present(
        &self,
        state: Option<&Round<Self>>,
        previous: &Self::Presentation,
        viewer: &Viewer,
    ) -> Self::Presentation
    where
        Self: Sized;
}
