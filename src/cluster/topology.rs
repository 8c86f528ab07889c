//! Cached cluster topology and the sync protocol that refreshes it.

use crate::cluster::registry::ConnRegistry;
use crate::cluster::rpc::{ChangeType, Channel, ClusterConfigChangeReq};
use crate::cluster::slots::SLOT_COUNT;
use crate::error::{Result, RouterError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// A member of a shard group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub id: u64,
    pub address: String,
}

/// A half-open range of slots assigned to a shard group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    /// Start slot (inclusive)
    pub start: u16,
    /// End slot (exclusive)
    pub end: u16,
}

impl SlotRange {
    pub fn new(start: u16, end: u16) -> Self {
        assert!(start < end, "start must be less than end");
        assert!(end <= SLOT_COUNT, "end must be <= SLOT_COUNT");
        Self { start, end }
    }

    pub fn contains(&self, slot: u16) -> bool {
        slot >= self.start && slot < self.end
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl std::fmt::Display for SlotRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}-{})", self.start, self.end)
    }
}

/// A replicated partition of the keyspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardGroup {
    pub id: u64,
    pub slots: Vec<SlotRange>,
    pub servers: Vec<ServerInfo>,
    /// Id of the member believed to be leader at snapshot time
    pub leader_id: u64,
}

impl ShardGroup {
    pub fn owns_slot(&self, slot: u16) -> bool {
        self.slots.iter().any(|r| r.contains(slot))
    }

    /// The member this snapshot records as leader
    pub fn leader(&self) -> Option<&ServerInfo> {
        self.servers.iter().find(|s| s.id == self.leader_id)
    }
}

/// The full shard-group mapping as returned by the cluster's metadata
/// service at a point in time. Replaced wholesale on refresh, never
/// partially mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub groups: Vec<ShardGroup>,
}

impl TopologySnapshot {
    /// Linear scan for the group owning a slot. First match wins if the
    /// no-overlap invariant is ever broken upstream.
    pub fn group_for_slot(&self, slot: u16) -> Option<&ShardGroup> {
        self.groups.iter().find(|g| g.owns_slot(slot))
    }

    /// Every server address appearing anywhere in the snapshot
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| g.servers.iter().map(|s| s.address.as_str()))
    }
}

/// Shared, atomically-swapped view of the cluster topology.
///
/// Readers clone the inner `Arc` and never observe a half-updated
/// snapshot; a failed sync leaves the previous snapshot untouched.
pub struct TopologyCache {
    snapshot: RwLock<Arc<TopologySnapshot>>,
}

impl Default for TopologyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyCache {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(TopologySnapshot::default())),
        }
    }

    /// Get the current snapshot
    pub fn snapshot(&self) -> Arc<TopologySnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Whether any cached group covers the slot
    pub fn covers(&self, slot: u16) -> bool {
        self.snapshot().group_for_slot(slot).is_some()
    }

    fn install(&self, snapshot: TopologySnapshot) {
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(snapshot);
    }

    /// Refresh the cache with a full-topology query against one known node.
    ///
    /// On success the whole snapshot is replaced and a registry entry is
    /// created for every server address observed in the response. On
    /// failure the previous snapshot is retained unchanged.
    pub async fn sync(&self, chan: &dyn Channel, registry: &ConnRegistry) -> Result<()> {
        let req = ClusterConfigChangeReq {
            change_type: ChangeType::ShardsQuery,
            shard_group_id: 0,
        };

        let resp = chan
            .cluster_config_change(req)
            .await
            .map_err(|e| RouterError::Sync(e.to_string()))?;
        if !resp.success {
            return Err(RouterError::Sync(
                "metadata service rejected shards query".to_string(),
            ));
        }

        let snapshot = TopologySnapshot {
            groups: resp.groups,
        };
        for addr in snapshot.addresses() {
            registry.get_or_create(addr);
        }

        debug!(groups = snapshot.groups.len(), "installing topology snapshot");
        self.install(snapshot);
        info!("cluster topology synced");
        Ok(())
    }
}
