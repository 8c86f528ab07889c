//! Cluster routing layer: topology cache, connection registry and
//! two-hop leader resolution for a sharded, Raft-replicated key-value
//! cluster.
//!
//! The proxy never participates in consensus. It keeps an in-memory
//! snapshot of the slot-to-shard mapping (refreshed wholesale via the
//! metadata service), one lazily-created RPC channel per node address,
//! and confirms every cached leader with a live round-trip before
//! forwarding an operation.

mod client;
mod registry;
mod resolver;
mod rpc;
mod slots;
mod topology;

pub use client::RouteClient;
pub use registry::{ChannelFactory, ConnRegistry};
pub use resolver::LeaderResolver;
pub use rpc::{
    read_frame, write_frame, ChangeType, Channel, ClientOperationReq, ClientOperationResp,
    ClusterConfigChangeReq, ClusterConfigChangeResp, KvPair, OpType, RpcRequest, RpcResponse,
    TcpChannel,
};
pub use slots::{crc64, slot_for, SLOT_COUNT};
pub use topology::{ServerInfo, ShardGroup, SlotRange, TopologyCache, TopologySnapshot};
