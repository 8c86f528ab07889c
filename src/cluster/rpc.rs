//! RPC contract consumed from the cluster nodes.
//!
//! Two calls exist: `ClusterConfigChange` for metadata queries (full
//! topology or single-shard leader confirmation) and `ClientOperation`
//! for key-value reads and writes. Messages are bincode-encoded and
//! framed with a big-endian u32 length prefix over TCP.

use crate::cluster::topology::ShardGroup;
use crate::error::{Result, RouterError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

/// Upper bound on a single RPC frame
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Metadata query kinds carried by `ClusterConfigChangeReq`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    /// Full topology: every shard group in the cluster
    ShardsQuery,
    /// Leader confirmation scoped to one shard group
    MetaMembersQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfigChangeReq {
    pub change_type: ChangeType,
    /// Shard group the query is scoped to; ignored for `ShardsQuery`
    pub shard_group_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfigChangeResp {
    pub success: bool,
    pub groups: Vec<ShardGroup>,
}

/// Key-value operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpType {
    Put,
    Get,
    Del,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvPair {
    pub op: OpType,
    pub key: String,
    pub value: String,
    /// Set by the responder on Get/Del: whether the key existed
    pub found: bool,
}

impl KvPair {
    pub fn new(op: OpType, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            op,
            key: key.into(),
            value: value.into(),
            found: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientOperationReq {
    pub kvs: Vec<KvPair>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientOperationResp {
    pub success: bool,
    pub kvs: Vec<KvPair>,
}

/// Wire envelope for requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcRequest {
    ClusterConfigChange(ClusterConfigChangeReq),
    ClientOperation(ClientOperationReq),
}

/// Wire envelope for responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcResponse {
    ClusterConfigChange(ClusterConfigChangeResp),
    ClientOperation(ClientOperationResp),
}

/// One remote-call endpoint. Implementations must be safe to share
/// across sessions; calls are blocking round-trips from the caller's
/// perspective.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn cluster_config_change(
        &self,
        req: ClusterConfigChangeReq,
    ) -> Result<ClusterConfigChangeResp>;

    async fn client_operation(&self, req: ClientOperationReq) -> Result<ClientOperationResp>;
}

/// Write one length-prefixed bincode frame
pub async fn write_frame<S, T>(stream: &mut S, msg: &T) -> Result<()>
where
    S: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = bincode::serialize(msg)?;
    stream
        .write_all(&(body.len() as u32).to_be_bytes())
        .await
        .map_err(|e| RouterError::Transport(e.to_string()))?;
    stream
        .write_all(&body)
        .await
        .map_err(|e| RouterError::Transport(e.to_string()))?;
    stream
        .flush()
        .await
        .map_err(|e| RouterError::Transport(e.to_string()))?;
    Ok(())
}

/// Read one length-prefixed bincode frame
pub async fn read_frame<S, T>(stream: &mut S) -> Result<T>
where
    S: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| RouterError::Transport(e.to_string()))?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(RouterError::Transport(format!(
            "frame length {} exceeds limit",
            len
        )));
    }
    let mut body = vec![0u8; len];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|e| RouterError::Transport(e.to_string()))?;
    Ok(bincode::deserialize(&body)?)
}

/// TCP-backed channel. The connection is established lazily on the first
/// call, never at creation. A call takes the cached connection out for
/// the duration of the exchange; concurrent calls on the same channel
/// open their own connections rather than waiting, so a stalled peer
/// stalls only the caller whose request is on the wire. A call that
/// fails drops its connection so the next call reconnects.
pub struct TcpChannel {
    addr: String,
    /// Idle cached connection. The lock guards only the slot, never an
    /// in-flight exchange.
    conn: Mutex<Option<TcpStream>>,
}

impl TcpChannel {
    pub fn new(addr: String) -> Self {
        Self {
            addr,
            conn: Mutex::new(None),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn round_trip(&self, req: RpcRequest) -> Result<RpcResponse> {
        let cached = self.conn.lock().await.take();
        let mut stream = match cached {
            Some(s) => s,
            None => {
                debug!(addr = %self.addr, "opening rpc connection");
                TcpStream::connect(&self.addr).await.map_err(|e| {
                    RouterError::Transport(format!("connect {}: {}", self.addr, e))
                })?
            }
        };

        let result = async {
            write_frame(&mut stream, &req).await?;
            read_frame::<_, RpcResponse>(&mut stream).await
        }
        .await;

        if result.is_ok() {
            // Return the connection to the slot unless a concurrent call
            // already cached one; the spare is simply closed.
            let mut guard = self.conn.lock().await;
            if guard.is_none() {
                *guard = Some(stream);
            }
        }
        // Connection state is unknown after a failed exchange; drop it
        result
    }
}

#[async_trait]
impl Channel for TcpChannel {
    async fn cluster_config_change(
        &self,
        req: ClusterConfigChangeReq,
    ) -> Result<ClusterConfigChangeResp> {
        match self.round_trip(RpcRequest::ClusterConfigChange(req)).await? {
            RpcResponse::ClusterConfigChange(resp) => Ok(resp),
            RpcResponse::ClientOperation(_) => Err(RouterError::Transport(
                "unexpected response type for config change".to_string(),
            )),
        }
    }

    async fn client_operation(&self, req: ClientOperationReq) -> Result<ClientOperationResp> {
        match self.round_trip(RpcRequest::ClientOperation(req)).await? {
            RpcResponse::ClientOperation(resp) => Ok(resp),
            RpcResponse::ClusterConfigChange(_) => Err(RouterError::Transport(
                "unexpected response type for client operation".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_creation_does_not_connect() {
        // Creation must never validate reachability
        let chan = TcpChannel::new("240.0.0.1:1".to_string());
        assert_eq!(chan.addr(), "240.0.0.1:1");
    }

    #[tokio::test]
    async fn test_call_on_unreachable_address_fails() {
        // TEST-NET address: connect should fail fast or at least error out
        let chan = TcpChannel::new("192.0.2.1:9".to_string());
        let req = ClusterConfigChangeReq {
            change_type: ChangeType::ShardsQuery,
            shard_group_id: 0,
        };
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            chan.cluster_config_change(req),
        )
        .await;
        if let Ok(inner) = result {
            assert!(inner.is_err());
        }
    }

    #[tokio::test]
    async fn test_stalled_call_does_not_block_other_calls() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::time::Duration;
        use tokio::net::TcpListener;

        // A node that never answers its first connection but serves
        // every later one
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let first = Arc::new(AtomicBool::new(true));

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let stall = first.swap(false, Ordering::SeqCst);
                tokio::spawn(async move {
                    let Ok(_req) = read_frame::<_, RpcRequest>(&mut stream).await else {
                        return;
                    };
                    if stall {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        return;
                    }
                    let resp = RpcResponse::ClusterConfigChange(ClusterConfigChangeResp {
                        success: true,
                        groups: vec![],
                    });
                    let _ = write_frame(&mut stream, &resp).await;
                });
            }
        });

        let req = || ClusterConfigChangeReq {
            change_type: ChangeType::ShardsQuery,
            shard_group_id: 0,
        };
        let chan = Arc::new(TcpChannel::new(addr));

        let stalled = {
            let chan = Arc::clone(&chan);
            tokio::spawn(async move { chan.cluster_config_change(req()).await })
        };
        // Let the stalled call get its request on the wire first
        tokio::time::sleep(Duration::from_millis(100)).await;

        let second = tokio::time::timeout(
            Duration::from_secs(5),
            chan.cluster_config_change(req()),
        )
        .await;
        let resp = second.expect("second call must not wait behind the stalled one");
        assert!(resp.unwrap().success);

        stalled.abort();
    }

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        let req = RpcRequest::ClusterConfigChange(ClusterConfigChangeReq {
            change_type: ChangeType::MetaMembersQuery,
            shard_group_id: 7,
        });
        write_frame(&mut a, &req).await.unwrap();

        let decoded: RpcRequest = read_frame(&mut b).await.unwrap();
        match decoded {
            RpcRequest::ClusterConfigChange(r) => {
                assert_eq!(r.change_type, ChangeType::MetaMembersQuery);
                assert_eq!(r.shard_group_id, 7);
            }
            _ => panic!("wrong variant"),
        }
    }
}
