use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::NotificationChannel;
use crate::types::ChannelKind;

/// Holds one channel per channel kind.
///
/// Built up front and handed to a service, which only reads from it.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    channels: HashMap<ChannelKind, Arc<dyn NotificationChannel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under its own kind, returning the channel it replaced.
    pub fn register(
        &mut self,
        channel: Arc<dyn NotificationChannel>,
    ) -> Option<Arc<dyn NotificationChannel>> {
        let kind = channel.channel_kind();
        debug!(channel = %kind, "Registered channel");
        self.channels.insert(kind, channel)
    }

    pub fn get(&self, kind: ChannelKind) -> Option<Arc<dyn NotificationChannel>> {
        self.channels.get(&kind).cloned()
    }

    pub fn unregister(&mut self, kind: ChannelKind) -> Option<Arc<dyn NotificationChannel>> {
        debug!(channel = %kind, "Unregistered channel");
        self.channels.remove(&kind)
    }

    pub fn contains(&self, kind: ChannelKind) -> bool {
        self.channels.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<ChannelKind> {
        self.channels.keys().copied().collect()
    }

    pub fn channels(&self) -> impl Iterator<Item = &Arc<dyn NotificationChannel>> {
        self.channels.values()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn clear(&mut self) {
        self.channels.clear();
        debug!("Cleared all channels");
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
