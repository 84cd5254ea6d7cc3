use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::gateway::{GatewayTransport, PresenceUpdate};

/// Cycles a fixed list of presence strings, wrapping modulo the list length.
/// With a single entry the rotation is a constant presence.
pub struct StatusRotator {
    statuses: Vec<String>,
    index: AtomicUsize,
}

impl StatusRotator {
    /// Statuses are validated non-empty by config; an empty list here still
    /// degrades to a single placeholder rather than a panic path.
    pub fn new(statuses: Vec<String>) -> Self {
        let statuses = if statuses.is_empty() { vec![String::from("online")] } else { statuses };
        Self { statuses, index: AtomicUsize::new(0) }
    }

    /// The status for the current tick; advances the rotation.
    pub fn next_status(&self) -> &str {
        let index = self.index.fetch_add(1, Ordering::Relaxed) % self.statuses.len();
        &self.statuses[index]
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

/// One rotation tick: publish the next status through the gateway.
pub async fn tick(transport: &Arc<dyn GatewayTransport>, rotator: &StatusRotator) {
    let update = PresenceUpdate::playing(rotator.next_status());
    match transport.update_presence(&update).await {
        Ok(()) => debug!(
            event_name = "presence.updated",
            activity = %update.activity,
            "presence updated"
        ),
        Err(error) => warn!(
            event_name = "presence.update_failed",
            activity = %update.activity,
            error = %error,
            "presence update failed; will retry on the next tick"
        ),
    }
}

/// Rotation loop. Runs until the owning task is dropped; the first update
/// fires immediately so the bot never sits without a presence.
pub async fn run(transport: Arc<dyn GatewayTransport>, rotator: Arc<StatusRotator>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        tick(&transport, &rotator).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{tick, StatusRotator};
    use crate::events::InteractionEnvelope;
    use crate::gateway::{GatewayTransport, PresenceUpdate, TransportError};

    #[derive(Default)]
    struct RecordingTransport {
        updates: Mutex<Vec<PresenceUpdate>>,
    }

    #[async_trait]
    impl GatewayTransport for RecordingTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn next_envelope(&self) -> Result<Option<InteractionEnvelope>, TransportError> {
            Ok(None)
        }

        async fn acknowledge(&self, _envelope: &InteractionEnvelope) -> Result<(), TransportError> {
            Ok(())
        }

        async fn update_presence(&self, presence: &PresenceUpdate) -> Result<(), TransportError> {
            self.updates.lock().await.push(presence.clone());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn rotation_wraps_modulo_list_length() {
        let rotator =
            StatusRotator::new(vec!["one".to_string(), "two".to_string(), "three".to_string()]);

        let observed: Vec<&str> = (0..7).map(|_| rotator.next_status()).collect();
        assert_eq!(observed, vec!["one", "two", "three", "one", "two", "three", "one"]);
    }

    #[test]
    fn single_status_rotation_is_constant() {
        let rotator = StatusRotator::new(vec!["[VEF] Hub".to_string()]);

        for _ in 0..5 {
            assert_eq!(rotator.next_status(), "[VEF] Hub");
        }
    }

    #[test]
    fn empty_status_list_degrades_to_placeholder() {
        let rotator = StatusRotator::new(Vec::new());
        assert_eq!(rotator.next_status(), "online");
        assert_eq!(rotator.len(), 1);
    }

    #[tokio::test]
    async fn ticks_publish_successive_statuses() {
        let recording = Arc::new(RecordingTransport::default());
        let transport: Arc<dyn GatewayTransport> = recording.clone();
        let rotator = StatusRotator::new(vec!["one".to_string(), "two".to_string()]);

        tick(&transport, &rotator).await;
        tick(&transport, &rotator).await;
        tick(&transport, &rotator).await;

        let updates = recording.updates.lock().await;
        let activities: Vec<&str> =
            updates.iter().map(|update| update.activity.as_str()).collect();
        assert_eq!(activities, vec!["one", "two", "one"]);
    }
}
