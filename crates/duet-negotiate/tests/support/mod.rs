//! Scripted in-memory engine that follows WebRTC signaling-state rules.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use duet_common::{CandidateDescriptor, Error, Result, SdpType, SessionDescription, SignalMessage};
use duet_negotiate::{
    ConnectionId, Coordinator, NegotiationRole, SignalingState, StreamRoster, TransportEngine,
};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpType),
    SetRemote(SdpType),
    Rollback,
    AddCandidate(String),
    RestartIce,
}

#[derive(Debug)]
struct Inner {
    name: String,
    signaling: SignalingState,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    candidates: Vec<CandidateDescriptor>,
    calls: Vec<Call>,
    descriptions_created: u32,
    fail_create_offer: bool,
    fail_set_local: bool,
    rejected_candidates: HashSet<String>,
}

#[derive(Debug)]
pub struct FakeEngine {
    inner: Mutex<Inner>,
}

impl FakeEngine {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                name: name.to_string(),
                signaling: SignalingState::Stable,
                local: None,
                remote: None,
                candidates: Vec::new(),
                calls: Vec::new(),
                descriptions_created: 0,
                fail_create_offer: false,
                fail_set_local: false,
                rejected_candidates: HashSet::new(),
            }),
        })
    }

    pub fn fail_create_offer(&self, fail: bool) {
        self.inner.lock().unwrap().fail_create_offer = fail;
    }

    pub fn fail_set_local(&self, fail: bool) {
        self.inner.lock().unwrap().fail_set_local = fail;
    }

    pub fn reject_candidate(&self, candidate: &str) {
        self.inner
            .lock()
            .unwrap()
            .rejected_candidates
            .insert(candidate.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn candidates(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .candidates
            .iter()
            .map(|c| c.candidate.clone())
            .collect()
    }

    pub fn remote(&self) -> Option<SessionDescription> {
        self.inner.lock().unwrap().remote.clone()
    }

    pub fn local(&self) -> Option<SessionDescription> {
        self.inner.lock().unwrap().local.clone()
    }

    pub fn restarts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == Call::RestartIce)
            .count()
    }
}

#[async_trait]
impl TransportEngine for FakeEngine {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::CreateOffer);
        if inner.fail_create_offer {
            return Err(Error::engine("offer creation refused"));
        }
        if inner.signaling == SignalingState::HaveRemoteOffer {
            return Err(Error::engine("cannot create offer in have-remote-offer"));
        }
        inner.descriptions_created += 1;
        Ok(SessionDescription::offer(format!(
            "{}-offer-{}",
            inner.name, inner.descriptions_created
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::CreateAnswer);
        if inner.signaling != SignalingState::HaveRemoteOffer {
            return Err(Error::engine("no remote offer to answer"));
        }
        inner.descriptions_created += 1;
        Ok(SessionDescription::answer(format!(
            "{}-answer-{}",
            inner.name, inner.descriptions_created
        )))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::SetLocal(description.sdp_type));
        if inner.fail_set_local {
            return Err(Error::engine("local description refused"));
        }
        inner.signaling = match (description.sdp_type, inner.signaling) {
            (SdpType::Offer, SignalingState::Stable | SignalingState::HaveLocalOffer) => {
                SignalingState::HaveLocalOffer
            }
            (SdpType::Answer, SignalingState::HaveRemoteOffer) => SignalingState::Stable,
            (sdp_type, state) => {
                return Err(Error::engine(format!(
                    "cannot set local {sdp_type:?} in {state:?}"
                )))
            }
        };
        inner.local = Some(description);
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::SetRemote(description.sdp_type));
        inner.signaling = match (description.sdp_type, inner.signaling) {
            (SdpType::Offer, SignalingState::Stable | SignalingState::HaveRemoteOffer) => {
                SignalingState::HaveRemoteOffer
            }
            (SdpType::Answer, SignalingState::HaveLocalOffer) => SignalingState::Stable,
            (sdp_type, state) => {
                return Err(Error::engine(format!(
                    "cannot set remote {sdp_type:?} in {state:?}"
                )))
            }
        };
        inner.remote = Some(description);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Rollback);
        match inner.signaling {
            SignalingState::HaveLocalOffer | SignalingState::HaveRemoteOffer => {
                inner.signaling = SignalingState::Stable;
                Ok(())
            }
            state => Err(Error::engine(format!("nothing to roll back in {state:?}"))),
        }
    }

    async fn add_ice_candidate(&self, candidate: CandidateDescriptor) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::AddCandidate(candidate.candidate.clone()));
        if inner.remote.is_none() {
            return Err(Error::engine("no remote description"));
        }
        if inner.rejected_candidates.contains(&candidate.candidate) {
            return Err(Error::engine("candidate rejected"));
        }
        inner.candidates.push(candidate);
        Ok(())
    }

    async fn restart_ice(&self) -> Result<()> {
        self.inner.lock().unwrap().calls.push(Call::RestartIce);
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        self.inner.lock().unwrap().signaling
    }
}

pub type TestCoordinator = Coordinator<Arc<FakeEngine>, mpsc::UnboundedSender<String>>;

pub struct Peer {
    pub coordinator: TestCoordinator,
    pub engine: Arc<FakeEngine>,
    pub roster: Arc<StreamRoster>,
    pub outbox: mpsc::UnboundedReceiver<String>,
}

impl Peer {
    pub fn new(name: &str, role: NegotiationRole) -> Self {
        let engine = FakeEngine::new(name);
        let roster = Arc::new(StreamRoster::new());
        let (tx, outbox) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(
            ConnectionId::new(name),
            role,
            Arc::clone(&engine),
            tx,
            roster.clone(),
        );
        Self {
            coordinator,
            engine,
            roster,
            outbox,
        }
    }

    /// Everything sent to the relay so far, decoded.
    pub fn sent(&mut self) -> Vec<SignalMessage> {
        let mut sent = Vec::new();
        while let Ok(frame) = self.outbox.try_recv() {
            sent.push(SignalMessage::decode(&frame).expect("coordinator sent a valid frame"));
        }
        sent
    }

    pub async fn receive(&mut self, message: &SignalMessage) {
        let frame = message.encode().unwrap();
        self.coordinator.on_signal_received(frame.as_bytes()).await;
    }
}

pub fn remote_candidate(n: u8) -> CandidateDescriptor {
    CandidateDescriptor::new(
        format!("candidate:{n} 1 udp 2130706431 192.0.2.{n} 50000 typ host"),
        0,
        Some("0".to_string()),
    )
}
