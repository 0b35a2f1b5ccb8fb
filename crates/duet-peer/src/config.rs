use clap::Parser;
use duet_common::{Error, Result};
use duet_negotiate::{ConnectionId, NegotiationRole};
use uuid::Uuid;

use crate::engine::{EngineConfig, DEFAULT_STUN_URL};

#[derive(Parser, Debug, Clone)]
#[command(name = "duet-peer")]
#[command(about = "Duet endpoint - negotiates a WebRTC session with one remote peer through a relay")]
pub struct Args {
    /// Relay room URL (ws:// or wss://)
    #[arg(long, env = "DUET_RELAY_URL", default_value = "ws://127.0.0.1:8080/ws/default")]
    pub relay_url: String,

    /// Identifier of this endpoint; random when unset
    #[arg(long, env = "DUET_PEER_ID")]
    pub peer_id: Option<String>,

    /// Identifier of the remote endpoint, used to derive the negotiation role
    #[arg(long, env = "DUET_REMOTE_ID")]
    pub remote_id: Option<String>,

    /// Force the negotiation role instead of deriving it from the ids
    #[arg(long)]
    pub role: Option<NegotiationRole>,

    /// STUN server URLs
    #[arg(long = "stun", env = "DUET_STUN_URLS", value_delimiter = ',', default_value = DEFAULT_STUN_URL)]
    pub stun_urls: Vec<String>,

    /// Label of the data channel opened at startup
    #[arg(long, default_value = "duet")]
    pub data_channel: String,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// The configured peer id, or a fresh UUID.
    pub fn peer_id(&self) -> String {
        self.peer_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    pub fn negotiation_role(&self, local_id: &str) -> Result<NegotiationRole> {
        if let Some(role) = self.role {
            return Ok(role);
        }
        match self.remote_id.as_deref() {
            Some(remote_id) => NegotiationRole::assign(local_id, remote_id),
            None => Err(Error::config(
                "either --role or --remote-id is required to pick a negotiation role",
            )),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        match self.remote_id.as_deref() {
            Some(remote_id) => ConnectionId::new(remote_id),
            None => ConnectionId::new("remote"),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            ice_servers: self.stun_urls.clone(),
        }
    }
}
