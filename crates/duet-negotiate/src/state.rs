//! Per-connection negotiation state.

use std::collections::VecDeque;

use duet_common::CandidateDescriptor;

/// Where an inbound remote candidate should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateRoute {
    /// A remote description is in place; hand it to the engine now.
    Apply(CandidateDescriptor),
    /// No remote description yet; held until one is applied.
    Queued,
    /// Belongs to an offer we ignored.
    Discarded,
}

/// Mutable negotiation state owned by one coordinator.
///
/// `pending` is only non-empty while no remote description has been applied.
#[derive(Debug, Default)]
pub struct NegotiationState {
    pub(crate) making_offer: bool,
    pending: VecDeque<CandidateDescriptor>,
    /// Count of remote descriptions applied so far; 0 means none.
    remote_generation: u64,
    /// Remote generation current when the last colliding offer was ignored.
    ignored_at: Option<u64>,
}

impl NegotiationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn making_offer(&self) -> bool {
        self.making_offer
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_generation > 0
    }

    pub fn remote_generation(&self) -> u64 {
        self.remote_generation
    }

    /// True while the most recent offer/answer exchange ended in an ignored
    /// offer and no newer remote description has been accepted since.
    pub fn is_ignoring_offer(&self) -> bool {
        self.ignored_at == Some(self.remote_generation)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn offer_ignored(&mut self) {
        self.ignored_at = Some(self.remote_generation);
    }

    /// Record a successfully applied remote description and hand back the
    /// candidates that were waiting for it, oldest first.
    pub(crate) fn remote_description_applied(&mut self) -> Vec<CandidateDescriptor> {
        self.remote_generation += 1;
        self.ignored_at = None;
        self.pending.drain(..).collect()
    }

    pub(crate) fn route_candidate(&mut self, candidate: CandidateDescriptor) -> CandidateRoute {
        if self.is_ignoring_offer() {
            return CandidateRoute::Discarded;
        }
        if !self.has_remote_description() {
            self.pending.push_back(candidate);
            return CandidateRoute::Queued;
        }
        CandidateRoute::Apply(candidate)
    }
}
