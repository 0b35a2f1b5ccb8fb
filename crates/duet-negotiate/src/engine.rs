//! The media-transport engine seam.
//!
//! The coordinator never touches a peer connection directly. It drives an
//! implementation of [`TransportEngine`] and consumes the [`EngineEvent`]s that
//! implementation reports.

use std::sync::Arc;

use async_trait::async_trait;
use duet_common::{CandidateDescriptor, Result, SessionDescription};

/// Offer/answer state of the underlying peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

/// Aggregate transport state of the peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceGatheringState {
    New,
    Gathering,
    Complete,
}

/// Everything the engine reports back to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    NegotiationNeeded,
    /// `None` marks the end of local gathering.
    LocalCandidate(Option<CandidateDescriptor>),
    ConnectionStateChanged(ConnectionState),
    IceConnectionStateChanged(IceConnectionState),
    IceGatheringStateChanged(IceGatheringState),
    SignalingStateChanged(SignalingState),
    TrackReceived { stream_id: String },
    TrackEnded { stream_id: String },
}

/// Operations the coordinator needs from a peer connection.
#[async_trait]
pub trait TransportEngine: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Discard a pending local or remote description and return to stable.
    async fn rollback(&self) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: CandidateDescriptor) -> Result<()>;

    /// Renegotiate transport connectivity only. The engine is expected to
    /// report `NegotiationNeeded` afterwards.
    async fn restart_ice(&self) -> Result<()>;

    fn signaling_state(&self) -> SignalingState;
}

#[async_trait]
impl<E: TransportEngine + ?Sized> TransportEngine for Arc<E> {
    async fn create_offer(&self) -> Result<SessionDescription> {
        (**self).create_offer().await
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        (**self).create_answer().await
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        (**self).set_local_description(description).await
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        (**self).set_remote_description(description).await
    }

    async fn rollback(&self) -> Result<()> {
        (**self).rollback().await
    }

    async fn add_ice_candidate(&self, candidate: CandidateDescriptor) -> Result<()> {
        (**self).add_ice_candidate(candidate).await
    }

    async fn restart_ice(&self) -> Result<()> {
        (**self).restart_ice().await
    }

    fn signaling_state(&self) -> SignalingState {
        (**self).signaling_state()
    }
}
