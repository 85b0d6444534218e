use std::sync::Arc;

use nostr_core::{sign_event, ProfileMetadata, PublishReport, RelayError, RelayHandle, SigningError};
use nostr_sdk::{Keys, PublicKey, UnsignedEvent};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Sign(#[from] SigningError),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error("failed to encode profile metadata: {0}")]
    Profile(#[from] serde_json::Error),
    #[error("no relay accepted event {0}")]
    NotAccepted(String),
}

/// Signs events with the bot key and fans them out to every relay.
#[derive(Clone)]
pub struct Publisher {
    relay: Arc<dyn RelayHandle>,
    keys: Keys,
}

impl Publisher {
    pub fn new(relay: Arc<dyn RelayHandle>, keys: Keys) -> Self {
        Self { relay, keys }
    }

    /// Identity every published event is authored by.
    pub fn author(&self) -> PublicKey {
        self.keys.public_key()
    }

    /// Sign `unsigned` and send it to every relay.
    ///
    /// A relay rejecting the event does not stop delivery to the others;
    /// each outcome is logged. Fails only when no relay accepted it.
    pub async fn publish(&self, unsigned: UnsignedEvent) -> Result<PublishReport, PublishError> {
        let event = sign_event(unsigned, &self.keys)?;
        let report = self.relay.publish(&event).await?;

        for url in &report.accepted {
            info!("Published {} to {}", report.event_id, url);
        }
        for (url, reason) in &report.rejected {
            warn!("Relay {} rejected {}: {}", url, report.event_id, reason);
        }

        if !report.is_success() {
            return Err(PublishError::NotAccepted(report.event_id.to_hex()));
        }
        Ok(report)
    }

    /// Publish the kind-0 profile descriptor.
    pub async fn publish_profile(
        &self,
        profile: &ProfileMetadata,
    ) -> Result<PublishReport, PublishError> {
        let unsigned = profile.to_unsigned(self.author())?;
        let report = self.publish(unsigned).await?;
        info!(
            "Published profile '{}' to {} relay(s)",
            profile.name,
            report.accepted.len()
        );
        Ok(report)
    }
}
