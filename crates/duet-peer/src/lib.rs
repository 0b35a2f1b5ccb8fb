//! Duet endpoint building blocks: the webrtc-rs engine adapter, the relay
//! client and command-line configuration.

#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod relay;

pub use config::Args;
pub use engine::{EngineConfig, WebRtcEngine};
pub use relay::RelayEvent;
