//! Signalling wire protocol.
//!
//! Every relay message is one JSON envelope:
//!
//! ```text
//! { "kind": "Offer" | "Answer" | "IceCandidate", "payload": "<json string>" }
//! ```
//!
//! The payload is serialized on its own and embedded as a string, so the
//! envelope can be decoded without knowing the inner schema.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Discriminant of a signalling envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalKind::Offer => "Offer",
            SignalKind::Answer => "Answer",
            SignalKind::IceCandidate => "IceCandidate",
        };
        f.write_str(name)
    }
}

/// SDP type carried inside an Offer/Answer payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// A session description as exchanged over the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// One connectivity candidate, in the browser `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescriptor {
    pub candidate: String,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_m_line_index: Option<u16>,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

impl CandidateDescriptor {
    pub fn new(candidate: impl Into<String>, sdp_m_line_index: u16, sdp_mid: Option<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_m_line_index: Some(sdp_m_line_index),
            sdp_mid,
            username_fragment: None,
        }
    }

    /// An empty candidate string marks the end of gathering.
    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate.trim().is_empty()
    }
}

/// A decoded signalling message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalMessage {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(CandidateDescriptor),
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    kind: SignalKind,
    payload: String,
}

impl SignalMessage {
    /// Wrap a description as an Offer or Answer according to its SDP type.
    pub fn from_description(description: SessionDescription) -> Self {
        match description.sdp_type {
            SdpType::Offer => Self::Offer(description),
            SdpType::Answer => Self::Answer(description),
        }
    }

    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Offer(_) => SignalKind::Offer,
            Self::Answer(_) => SignalKind::Answer,
            Self::IceCandidate(_) => SignalKind::IceCandidate,
        }
    }

    /// Serialize to the envelope text sent over the relay.
    pub fn encode(&self) -> Result<String> {
        let payload = match self {
            Self::Offer(description) | Self::Answer(description) => {
                serde_json::to_string(description)
            }
            Self::IceCandidate(candidate) => serde_json::to_string(candidate),
        }
        .map_err(Error::internal)?;

        serde_json::to_string(&Envelope {
            kind: self.kind(),
            payload,
        })
        .map_err(Error::internal)
    }

    /// Parse an envelope received from the relay.
    ///
    /// Fails with [`Error::MalformedMessage`] on anything that is not a
    /// well-formed envelope with a recognised kind and a matching payload.
    pub fn decode(raw: impl AsRef<[u8]>) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(raw.as_ref())
            .map_err(|e| Error::malformed(format!("envelope: {e}")))?;

        match envelope.kind {
            SignalKind::Offer | SignalKind::Answer => {
                let description: SessionDescription = serde_json::from_str(&envelope.payload)
                    .map_err(|e| {
                        Error::malformed(format!("{} payload: {e}", envelope.kind))
                    })?;
                let message = Self::from_description(description);
                if message.kind() != envelope.kind {
                    return Err(Error::malformed(format!(
                        "{} envelope carries a {} description",
                        envelope.kind,
                        message.kind()
                    )));
                }
                Ok(message)
            }
            SignalKind::IceCandidate => {
                let candidate: CandidateDescriptor = serde_json::from_str(&envelope.payload)
                    .map_err(|e| Error::malformed(format!("IceCandidate payload: {e}")))?;
                Ok(Self::IceCandidate(candidate))
            }
        }
    }
}
