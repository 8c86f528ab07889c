//! Connection registry: one shared RPC channel per node address.

use crate::cluster::rpc::{Channel, TcpChannel};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Builds a channel for a newly discovered address. Swappable so tests
/// can inject in-memory channels.
pub type ChannelFactory = Box<dyn Fn(&str) -> Arc<dyn Channel> + Send + Sync>;

/// Address-keyed map of open RPC channels.
///
/// Grows lazily as addresses are discovered during sync or resolution;
/// entries are created once and reused, never removed. The map lock is
/// held only for the lookup or create, never across a remote call.
pub struct ConnRegistry {
    factory: ChannelFactory,
    channels: RwLock<HashMap<String, Arc<dyn Channel>>>,
}

impl ConnRegistry {
    /// Registry backed by TCP channels
    pub fn new() -> Self {
        Self::with_factory(Box::new(|addr| {
            Arc::new(TcpChannel::new(addr.to_string())) as Arc<dyn Channel>
        }))
    }

    /// Registry with a custom channel factory
    pub fn with_factory(factory: ChannelFactory) -> Self {
        Self {
            factory,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Get the channel for an address, creating it on first touch.
    ///
    /// Idempotent: concurrent callers racing on the same new address all
    /// end up with the same channel. Creation never validates
    /// reachability; failures surface when a call is made.
    pub fn get_or_create(&self, addr: &str) -> Arc<dyn Channel> {
        if let Some(chan) = self
            .channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(addr)
        {
            return chan.clone();
        }

        let mut guard = self.channels.write().unwrap_or_else(|e| e.into_inner());
        guard
            .entry(addr.to_string())
            .or_insert_with(|| {
                debug!(addr, "creating rpc channel");
                (self.factory)(addr)
            })
            .clone()
    }

    /// Look up an existing channel without creating one
    pub fn get(&self, addr: &str) -> Option<Arc<dyn Channel>> {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(addr)
            .cloned()
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(addr)
    }

    pub fn len(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConnRegistry {
    fn default() -> Self {
        Self::new()
    }
}
