use hoksync_protocol::ClientMessage;
use tokio::sync::mpsc;
use tracing::warn;

/// Queue of outbound messages for the coordination service.
///
/// The channel outlives any single connection, so messages produced
/// while the link is down are delivered once it is back up.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<ClientMessage>,
}

impl Outbox {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Report an item the player acquired in-game
    pub fn item_received(&self, item: i64) {
        self.send(ClientMessage::ItemReceived { item });
    }

    /// Report locations newly detected as checked
    pub fn location_checks(&self, locations: Vec<i64>) {
        self.send(ClientMessage::LocationChecks { locations });
    }

    /// Request the item/location catalog
    pub fn get_catalog(&self) {
        self.send(ClientMessage::GetCatalog);
    }

    /// Request the full remote state, also used to resync after a gap
    pub fn get_state(&self) {
        self.send(ClientMessage::GetState);
    }

    fn send(&self, message: ClientMessage) {
        if self.tx.send(message).is_err() {
            warn!("Outbox receiver was dropped");
        }
    }
}
