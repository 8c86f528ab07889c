//! Routing client: the shared state one proxy process keeps about the
//! cluster, handed to every session by reference.

use crate::cluster::registry::ConnRegistry;
use crate::cluster::resolver::LeaderResolver;
use crate::cluster::slots::slot_for;
use crate::cluster::topology::{TopologyCache, TopologySnapshot};
use crate::error::{Result, RouterError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Client-side routing state for one cluster.
///
/// Owns the topology cache and connection registry and exposes them to
/// handlers through explicit methods; nothing here is process-global.
pub struct RouteClient {
    bootstrap: Vec<String>,
    topology: Arc<TopologyCache>,
    registry: Arc<ConnRegistry>,
    resolver: LeaderResolver,
    /// Set when a resolution found no covering group; consumed by the
    /// session to trigger one opportunistic resync.
    stale: AtomicBool,
}

impl RouteClient {
    /// Connect to a cluster given a comma-separated bootstrap address
    /// list, performing the eager first topology sync.
    pub async fn connect(bootstrap_addrs: &str) -> Result<Self> {
        Self::connect_with_registry(bootstrap_addrs, ConnRegistry::new()).await
    }

    /// Like `connect`, with a caller-supplied registry (used by tests to
    /// inject in-memory channels).
    pub async fn connect_with_registry(
        bootstrap_addrs: &str,
        registry: ConnRegistry,
    ) -> Result<Self> {
        let bootstrap: Vec<String> = bootstrap_addrs
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if bootstrap.is_empty() {
            return Err(RouterError::Sync(
                "no bootstrap addresses configured".to_string(),
            ));
        }

        let registry = Arc::new(registry);
        for addr in &bootstrap {
            debug!(%addr, "init rpc link to bootstrap node");
            registry.get_or_create(addr);
        }

        let topology = Arc::new(TopologyCache::new());
        let client = Self {
            bootstrap,
            resolver: LeaderResolver::new(Arc::clone(&topology), Arc::clone(&registry)),
            topology,
            registry,
            stale: AtomicBool::new(false),
        };

        client.resync().await?;
        Ok(client)
    }

    /// Re-run the full-topology sync against the bootstrap nodes, first
    /// one that answers wins. A failure leaves the cached snapshot
    /// untouched.
    pub async fn resync(&self) -> Result<()> {
        let mut last_err = RouterError::Sync("no bootstrap addresses".to_string());
        for addr in &self.bootstrap {
            let chan = self.registry.get_or_create(addr);
            match self.topology.sync(chan.as_ref(), &self.registry).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(%addr, "sync via bootstrap node failed: {}", e);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Resolve the current leader address for a partition key; `None` is
    /// a hard failure for the command in flight.
    pub async fn resolve_leader(&self, partition_key: &[u8]) -> Option<String> {
        let resolved = self.resolver.resolve_leader(partition_key).await;
        if resolved.is_none() && !self.topology.covers(slot_for(partition_key)) {
            // Slot-to-shard mapping looks stale, not just the leader
            self.stale.store(true, Ordering::Relaxed);
        }
        resolved
    }

    /// Consume the staleness flag set by a failed resolution
    pub fn take_stale(&self) -> bool {
        self.stale.swap(false, Ordering::Relaxed)
    }

    pub fn registry(&self) -> &ConnRegistry {
        &self.registry
    }

    pub fn topology_snapshot(&self) -> Arc<TopologySnapshot> {
        self.topology.snapshot()
    }
}
