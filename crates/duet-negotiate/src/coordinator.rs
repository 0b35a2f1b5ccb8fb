//! Offer/answer coordinator for one connection.

use std::sync::Arc;

use duet_common::{CandidateDescriptor, Result, SdpType, SessionDescription, SignalMessage};
use tracing::{debug, error, info, warn};

use crate::connection::{ConnectionEvent, ConnectionId};
use crate::engine::{EngineEvent, IceConnectionState, TransportEngine};
use crate::glare::{self, DescriptionVerdict};
use crate::registry::PeerRegistry;
use crate::role::NegotiationRole;
use crate::sink::SignalSink;
use crate::state::{CandidateRoute, NegotiationState};

/// Drives the engine's description exchange for a single connection.
///
/// Handlers take `&mut self` and are meant to run one at a time, in event
/// order; [`crate::ConnectionInbox`] provides that. No handler returns an
/// error: failures are logged and the next negotiation-needed event or
/// signalling message gets another chance.
pub struct Coordinator<E, S> {
    id: ConnectionId,
    role: NegotiationRole,
    engine: E,
    sink: S,
    registry: Arc<dyn PeerRegistry>,
    state: NegotiationState,
}

impl<E: TransportEngine, S: SignalSink> Coordinator<E, S> {
    pub fn new(
        id: ConnectionId,
        role: NegotiationRole,
        engine: E,
        sink: S,
        registry: Arc<dyn PeerRegistry>,
    ) -> Self {
        Self {
            id,
            role,
            engine,
            sink,
            registry,
            state: NegotiationState::new(),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn role(&self) -> NegotiationRole {
        self.role
    }

    pub fn state(&self) -> &NegotiationState {
        &self.state
    }

    pub async fn handle(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::SignalReceived(raw) => self.on_signal_received(raw.as_bytes()).await,
            ConnectionEvent::Engine(event) => self.on_engine_event(event).await,
        }
    }

    pub async fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::NegotiationNeeded => self.on_negotiation_needed().await,
            EngineEvent::LocalCandidate(candidate) => self.on_local_candidate(candidate),
            EngineEvent::ConnectionStateChanged(state) => {
                info!(connection = %self.id, ?state, "connection state changed");
            }
            EngineEvent::IceConnectionStateChanged(state) => {
                debug!(connection = %self.id, ?state, "ice connection state changed");
                if state == IceConnectionState::Failed {
                    self.on_connectivity_failed().await;
                }
            }
            EngineEvent::IceGatheringStateChanged(state) => {
                debug!(connection = %self.id, ?state, "ice gathering state changed");
            }
            EngineEvent::SignalingStateChanged(state) => {
                debug!(connection = %self.id, ?state, "signaling state changed");
            }
            EngineEvent::TrackReceived { stream_id } => {
                debug!(connection = %self.id, %stream_id, "remote track received");
                self.registry.add_peer(&stream_id);
            }
            EngineEvent::TrackEnded { stream_id } => {
                debug!(connection = %self.id, %stream_id, "remote track ended");
                self.registry.remove_peer(&stream_id);
            }
        }
    }

    /// Create, apply and send a local offer.
    ///
    /// `making_offer` is set for the duration and cleared on every exit.
    pub async fn on_negotiation_needed(&mut self) {
        debug!(connection = %self.id, "negotiation needed");
        self.state.making_offer = true;
        if let Err(err) = self.make_offer().await {
            error!(connection = %self.id, "negotiation failed: {}", err);
        }
        self.state.making_offer = false;
    }

    async fn make_offer(&mut self) -> Result<()> {
        let offer = self.engine.create_offer().await?;
        self.engine.set_local_description(offer.clone()).await?;
        self.send(SignalMessage::Offer(offer))?;
        info!(connection = %self.id, "sent offer");
        Ok(())
    }

    pub async fn on_signal_received(&mut self, raw: &[u8]) {
        let message = match SignalMessage::decode(raw) {
            Ok(message) => message,
            Err(err) => {
                warn!(connection = %self.id, "dropping signalling message: {}", err);
                return;
            }
        };
        debug!(connection = %self.id, kind = %message.kind(), "signalling message received");

        match message {
            SignalMessage::Offer(description) | SignalMessage::Answer(description) => {
                self.on_remote_description(description).await
            }
            SignalMessage::IceCandidate(candidate) => self.on_remote_candidate(candidate).await,
        }
    }

    async fn on_remote_description(&mut self, description: SessionDescription) {
        let verdict = glare::assess(
            description.sdp_type,
            self.role,
            self.state.making_offer,
            self.engine.signaling_state(),
        );

        match verdict {
            DescriptionVerdict::Ignore => {
                info!(connection = %self.id, "ignoring colliding remote offer");
                self.state.offer_ignored();
            }
            DescriptionVerdict::Accept { rollback } => {
                if let Err(err) = self.accept_description(description, rollback).await {
                    error!(connection = %self.id, "failed to apply remote description: {}", err);
                }
            }
        }
    }

    async fn accept_description(
        &mut self,
        description: SessionDescription,
        rollback: bool,
    ) -> Result<()> {
        if rollback {
            info!(connection = %self.id, "offer collision, rolling back local offer");
            self.engine.rollback().await?;
        }

        let sdp_type = description.sdp_type;
        self.engine.set_remote_description(description).await?;

        let pending = self.state.remote_description_applied();
        if !pending.is_empty() {
            debug!(connection = %self.id, count = pending.len(), "applying queued remote candidates");
        }
        for candidate in pending {
            self.apply_candidate(candidate).await;
        }

        if sdp_type == SdpType::Offer {
            let answer = self.engine.create_answer().await?;
            self.engine.set_local_description(answer.clone()).await?;
            self.send(SignalMessage::Answer(answer))?;
            info!(connection = %self.id, "sent answer");
        }
        Ok(())
    }

    async fn on_remote_candidate(&mut self, candidate: CandidateDescriptor) {
        match self.state.route_candidate(candidate) {
            CandidateRoute::Apply(candidate) => self.apply_candidate(candidate).await,
            CandidateRoute::Queued => {
                debug!(
                    connection = %self.id,
                    pending = self.state.pending_len(),
                    "no remote description yet, queued candidate"
                );
            }
            CandidateRoute::Discarded => {
                debug!(connection = %self.id, "discarding candidate of an ignored offer");
            }
        }
    }

    async fn apply_candidate(&self, candidate: CandidateDescriptor) {
        if let Err(err) = self.engine.add_ice_candidate(candidate).await {
            warn!(connection = %self.id, "failed to add remote candidate: {}", err);
        }
    }

    /// Forward a locally gathered candidate. End-of-candidates sends nothing.
    pub fn on_local_candidate(&self, candidate: Option<CandidateDescriptor>) {
        let Some(candidate) = candidate.filter(|c| !c.is_end_of_candidates()) else {
            debug!(connection = %self.id, "local candidate gathering complete");
            return;
        };
        if let Err(err) = self.send(SignalMessage::IceCandidate(candidate)) {
            warn!(connection = %self.id, "failed to send local candidate: {}", err);
        }
    }

    pub async fn on_connectivity_failed(&mut self) {
        warn!(connection = %self.id, "connectivity failed, restarting ice");
        if let Err(err) = self.engine.restart_ice().await {
            error!(connection = %self.id, "ice restart failed: {}", err);
        }
    }

    fn send(&self, message: SignalMessage) -> Result<()> {
        let frame = message.encode()?;
        self.sink.send(frame)
    }
}
