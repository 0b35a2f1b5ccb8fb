//! [`TransportEngine`] over a webrtc-rs peer connection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use async_trait::async_trait;
use duet_common::{CandidateDescriptor, Error, Result, SdpType, SessionDescription};
use duet_negotiate::{
    ConnectionHandle, ConnectionState, EngineEvent, IceConnectionState, IceGatheringState,
    SignalingState, TransportEngine,
};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_remote::TrackRemote;

pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub ice_servers: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![DEFAULT_STUN_URL.to_string()],
        }
    }
}

impl EngineConfig {
    fn rtc_configuration(&self) -> RTCConfiguration {
        let ice_servers = if self.ice_servers.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: self.ice_servers.clone(),
                ..Default::default()
            }]
        };
        RTCConfiguration {
            ice_servers,
            ..Default::default()
        }
    }
}

/// Peer connection whose callbacks feed a connection's event queue.
///
/// webrtc-rs 0.11 has no have-local-offer to stable transition, so a local
/// offer that never reached an answer is rolled back by swapping in a fresh
/// peer connection with the same configuration and data channels.
pub struct WebRtcEngine {
    api: API,
    rtc_config: RTCConfiguration,
    pc: RwLock<Arc<RTCPeerConnection>>,
    /// Bumped on every swap; callbacks of a replaced connection go quiet.
    generation: Arc<AtomicU64>,
    data_channels: Mutex<Vec<String>>,
    events: ConnectionHandle,
    /// Set by `restart_ice`, consumed by the next `create_offer`.
    ice_restart_pending: AtomicBool,
}

impl WebRtcEngine {
    pub async fn new(config: &EngineConfig, events: ConnectionHandle) -> Result<Self> {
        let mut media = MediaEngine::default();
        media.register_default_codecs().map_err(Error::engine)?;
        let registry = register_default_interceptors(Registry::new(), &mut media)
            .map_err(Error::engine)?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = config.rtc_configuration();
        let generation = Arc::new(AtomicU64::new(0));
        let pc = Arc::new(
            api.new_peer_connection(rtc_config.clone())
                .await
                .map_err(Error::engine)?,
        );
        attach_handlers(&pc, EventForwarder::new(events.clone(), generation.clone()));

        Ok(Self {
            api,
            rtc_config,
            pc: RwLock::new(pc),
            generation,
            data_channels: Mutex::new(Vec::new()),
            events,
            ice_restart_pending: AtomicBool::new(false),
        })
    }

    /// The live peer connection. Replaced by a rollback of an unanswered offer.
    pub fn peer_connection(&self) -> Arc<RTCPeerConnection> {
        self.pc
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Open a data channel. Adding it to a fresh connection fires
    /// negotiation-needed.
    pub async fn open_data_channel(&self, label: &str) -> Result<Arc<RTCDataChannel>> {
        let channel = self
            .peer_connection()
            .create_data_channel(label, None)
            .await
            .map_err(Error::engine)?;
        log_data_channel(&channel);
        self.channel_labels().push(label.to_string());
        Ok(channel)
    }

    pub async fn close(&self) -> Result<()> {
        self.peer_connection().close().await.map_err(Error::engine)
    }

    fn channel_labels(&self) -> MutexGuard<'_, Vec<String>> {
        self.data_channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn replace_peer_connection(&self) -> Result<()> {
        let fresh = Arc::new(
            self.api
                .new_peer_connection(self.rtc_config.clone())
                .await
                .map_err(Error::engine)?,
        );
        self.generation.fetch_add(1, Ordering::SeqCst);
        attach_handlers(
            &fresh,
            EventForwarder::new(self.events.clone(), self.generation.clone()),
        );

        let labels = self.channel_labels().clone();
        for label in &labels {
            let channel = fresh
                .create_data_channel(label, None)
                .await
                .map_err(Error::engine)?;
            log_data_channel(&channel);
        }

        let previous = std::mem::replace(
            &mut *self.pc.write().unwrap_or_else(|poisoned| poisoned.into_inner()),
            fresh,
        );
        if let Err(err) = previous.close().await {
            debug!("closing replaced peer connection: {}", err);
        }
        info!(channels = labels.len(), "replaced peer connection to drop unanswered offer");
        Ok(())
    }
}

/// Forwards callbacks of one peer connection generation.
#[derive(Clone)]
struct EventForwarder {
    events: ConnectionHandle,
    current: Arc<AtomicU64>,
    generation: u64,
}

impl EventForwarder {
    fn new(events: ConnectionHandle, current: Arc<AtomicU64>) -> Self {
        let generation = current.load(Ordering::SeqCst);
        Self {
            events,
            current,
            generation,
        }
    }

    fn forward(&self, event: EngineEvent) {
        if self.current.load(Ordering::SeqCst) != self.generation {
            debug!(?event, "dropping event of a replaced peer connection");
            return;
        }
        if let Err(err) = self.events.engine_event(event) {
            debug!("dropping engine event: {}", err);
        }
    }
}

fn attach_handlers(pc: &RTCPeerConnection, events: EventForwarder) {
    let forwarder = events.clone();
    pc.on_negotiation_needed(Box::new(move || {
        forwarder.forward(EngineEvent::NegotiationNeeded);
        Box::pin(async {})
    }));

    let forwarder = events.clone();
    pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        let descriptor = match candidate.map(|c| c.to_json()).transpose() {
            Ok(init) => init.map(candidate_from_init),
            Err(err) => {
                warn!("failed to serialize local candidate: {}", err);
                return Box::pin(async {});
            }
        };
        forwarder.forward(EngineEvent::LocalCandidate(descriptor));
        Box::pin(async {})
    }));

    let forwarder = events.clone();
    pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
        forwarder.forward(EngineEvent::ConnectionStateChanged(connection_state(state)));
        Box::pin(async {})
    }));

    let forwarder = events.clone();
    pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
        forwarder.forward(EngineEvent::IceConnectionStateChanged(ice_connection_state(
            state,
        )));
        Box::pin(async {})
    }));

    let forwarder = events.clone();
    pc.on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
        forwarder.forward(EngineEvent::IceGatheringStateChanged(ice_gathering_state(
            state,
        )));
        Box::pin(async {})
    }));

    let forwarder = events.clone();
    pc.on_signaling_state_change(Box::new(move |state: RTCSignalingState| {
        forwarder.forward(EngineEvent::SignalingStateChanged(signaling_state(state)));
        Box::pin(async {})
    }));

    pc.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
        let forwarder = events.clone();
        Box::pin(async move {
            let stream_id: String = track.stream_id().into();
            forwarder.forward(EngineEvent::TrackReceived {
                stream_id: stream_id.clone(),
            });
            tokio::spawn(async move {
                // Drain until the sender goes away.
                while track.read_rtp().await.is_ok() {}
                forwarder.forward(EngineEvent::TrackEnded { stream_id });
            });
        })
    }));

    pc.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
        Box::pin(async move {
            info!(label = channel.label(), "remote data channel opened");
            log_data_channel(&channel);
        })
    }));
}

fn log_data_channel(channel: &Arc<RTCDataChannel>) {
    let label = channel.label().to_string();
    channel.on_open(Box::new(move || {
        info!(label = %label, "data channel open");
        Box::pin(async {})
    }));
    let label = channel.label().to_string();
    channel.on_message(Box::new(move |msg| {
        debug!(label = %label, bytes = msg.data.len(), "data channel message");
        Box::pin(async {})
    }));
}

#[async_trait]
impl TransportEngine for WebRtcEngine {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let options = self
            .ice_restart_pending
            .swap(false, Ordering::SeqCst)
            .then(|| RTCOfferOptions {
                ice_restart: true,
                ..Default::default()
            });
        let offer = self
            .peer_connection()
            .create_offer(options)
            .await
            .map_err(Error::engine)?;
        description_from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection()
            .create_answer(None)
            .await
            .map_err(Error::engine)?;
        description_from_rtc(answer)
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection()
            .set_local_description(description_to_rtc(description)?)
            .await
            .map_err(Error::engine)
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection()
            .set_remote_description(description_to_rtc(description)?)
            .await
            .map_err(Error::engine)
    }

    async fn rollback(&self) -> Result<()> {
        let pc = self.peer_connection();
        match pc.signaling_state() {
            RTCSignalingState::HaveLocalOffer => {}
            RTCSignalingState::Stable | RTCSignalingState::Unspecified => {
                return Err(Error::engine("no local offer to roll back"));
            }
            other => {
                return Err(Error::engine(format!("cannot roll back from {other}")));
            }
        }

        if let Some(mut pending) = pc.pending_local_description().await {
            pending.sdp_type = RTCSdpType::Rollback;
            match pc.set_local_description(pending).await {
                Ok(()) => return Ok(()),
                Err(err) => debug!("in-place rollback refused: {}", err),
            }
        }

        if pc.current_remote_description().await.is_some() {
            return Err(Error::engine(
                "cannot roll back a renegotiation of an established session",
            ));
        }
        self.replace_peer_connection().await
    }

    async fn add_ice_candidate(&self, candidate: CandidateDescriptor) -> Result<()> {
        self.peer_connection()
            .add_ice_candidate(candidate_to_init(candidate))
            .await
            .map_err(Error::engine)
    }

    async fn restart_ice(&self) -> Result<()> {
        self.ice_restart_pending.store(true, Ordering::SeqCst);
        self.events.engine_event(EngineEvent::NegotiationNeeded)
    }

    fn signaling_state(&self) -> SignalingState {
        signaling_state(self.peer_connection().signaling_state())
    }
}

fn description_from_rtc(description: RTCSessionDescription) -> Result<SessionDescription> {
    let sdp_type = match description.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        other => {
            return Err(Error::engine(format!(
                "unsupported session description type {other}"
            )))
        }
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: description.sdp,
    })
}

fn description_to_rtc(description: SessionDescription) -> Result<RTCSessionDescription> {
    match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp),
        SdpType::Answer => RTCSessionDescription::answer(description.sdp),
    }
    .map_err(Error::engine)
}

pub fn candidate_from_init(init: RTCIceCandidateInit) -> CandidateDescriptor {
    CandidateDescriptor {
        candidate: init.candidate,
        sdp_m_line_index: init.sdp_mline_index,
        sdp_mid: init.sdp_mid,
        username_fragment: init.username_fragment,
    }
}

pub fn candidate_to_init(candidate: CandidateDescriptor) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_m_line_index,
        username_fragment: candidate.username_fragment,
    }
}

pub fn signaling_state(state: RTCSignalingState) -> SignalingState {
    match state {
        RTCSignalingState::Unspecified | RTCSignalingState::Stable => SignalingState::Stable,
        RTCSignalingState::HaveLocalOffer => SignalingState::HaveLocalOffer,
        RTCSignalingState::HaveRemoteOffer => SignalingState::HaveRemoteOffer,
        RTCSignalingState::HaveLocalPranswer => SignalingState::HaveLocalPranswer,
        RTCSignalingState::HaveRemotePranswer => SignalingState::HaveRemotePranswer,
        RTCSignalingState::Closed => SignalingState::Closed,
    }
}

pub fn connection_state(state: RTCPeerConnectionState) -> ConnectionState {
    match state {
        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => ConnectionState::New,
        RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
        RTCPeerConnectionState::Connected => ConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => ConnectionState::Failed,
        RTCPeerConnectionState::Closed => ConnectionState::Closed,
    }
}

pub fn ice_connection_state(state: RTCIceConnectionState) -> IceConnectionState {
    match state {
        RTCIceConnectionState::Unspecified | RTCIceConnectionState::New => IceConnectionState::New,
        RTCIceConnectionState::Checking => IceConnectionState::Checking,
        RTCIceConnectionState::Connected => IceConnectionState::Connected,
        RTCIceConnectionState::Completed => IceConnectionState::Completed,
        RTCIceConnectionState::Disconnected => IceConnectionState::Disconnected,
        RTCIceConnectionState::Failed => IceConnectionState::Failed,
        RTCIceConnectionState::Closed => IceConnectionState::Closed,
    }
}

pub fn ice_gathering_state(state: RTCIceGathererState) -> IceGatheringState {
    match state {
        RTCIceGathererState::Unspecified | RTCIceGathererState::New => IceGatheringState::New,
        RTCIceGathererState::Gathering => IceGatheringState::Gathering,
        RTCIceGathererState::Complete | RTCIceGathererState::Closed => IceGatheringState::Complete,
    }
}
