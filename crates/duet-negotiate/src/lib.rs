//! Session negotiation for two endpoints talking through a relay.
//!
//! The [`Coordinator`] owns one connection's negotiation state and reacts to
//! engine events and relay messages. Glare (both sides offering at once) is
//! resolved by a fixed [`NegotiationRole`]: the polite peer yields, the
//! impolite peer keeps its own offer.
//!
//! Events for a connection are serialized through a
//! [`ConnectionHandle`]/[`ConnectionInbox`] pair so at most one handler is in
//! flight per connection.

#![forbid(unsafe_code)]

pub mod connection;
pub mod coordinator;
pub mod engine;
pub mod glare;
pub mod registry;
pub mod role;
pub mod sink;
pub mod state;

pub use connection::{ConnectionEvent, ConnectionHandle, ConnectionId, ConnectionInbox, ConnectionTable};
pub use coordinator::Coordinator;
pub use engine::{
    ConnectionState, EngineEvent, IceConnectionState, IceGatheringState, SignalingState,
    TransportEngine,
};
pub use glare::DescriptionVerdict;
pub use registry::{PeerRegistry, StreamRoster};
pub use role::NegotiationRole;
pub use sink::SignalSink;
pub use state::{CandidateRoute, NegotiationState};
