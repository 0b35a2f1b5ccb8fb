//! Glare resolution for inbound session descriptions.

use duet_common::SdpType;

use crate::engine::SignalingState;
use crate::role::NegotiationRole;

/// What to do with an inbound Offer or Answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionVerdict {
    /// Colliding offer received by the impolite peer. Drop it untouched.
    Ignore,
    /// Apply the description, rolling back the pending local one first.
    Accept { rollback: bool },
}

/// Decide how to treat an inbound description.
///
/// An offer collides when we are building one ourselves or the connection is
/// not stable. The impolite peer ignores a colliding offer; the polite peer
/// rolls back whatever is pending and takes the remote offer. There is only
/// something to roll back once the engine has left `Stable`.
pub fn assess(
    sdp_type: SdpType,
    role: NegotiationRole,
    making_offer: bool,
    signaling_state: SignalingState,
) -> DescriptionVerdict {
    let offer_collision =
        sdp_type == SdpType::Offer && (making_offer || signaling_state != SignalingState::Stable);

    if offer_collision && !role.is_polite() {
        return DescriptionVerdict::Ignore;
    }

    DescriptionVerdict::Accept {
        rollback: offer_collision && signaling_state != SignalingState::Stable,
    }
}
