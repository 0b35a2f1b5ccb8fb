use duet_common::{Error, Result};
use tokio::sync::mpsc;

/// Outbound half of the signalling relay.
///
/// `send` must not block: delivery is fire-and-forget and the coordinator
/// never waits for the relay.
pub trait SignalSink: Send + Sync {
    fn send(&self, frame: String) -> Result<()>;
}

impl SignalSink for mpsc::UnboundedSender<String> {
    fn send(&self, frame: String) -> Result<()> {
        mpsc::UnboundedSender::send(self, frame).map_err(|_| Error::relay("relay outbox closed"))
    }
}

impl SignalSink for mpsc::Sender<String> {
    fn send(&self, frame: String) -> Result<()> {
        self.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::relay("relay outbox full"),
            mpsc::error::TrySendError::Closed(_) => Error::relay("relay outbox closed"),
        })
    }
}
