use super::CommandHandler;
use crate::cluster::{ClientOperationReq, KvPair, OpType, RouteClient};
use crate::error::{Result, RouterError};
use crate::protocol::Reply;
use async_trait::async_trait;
use tracing::debug;

/// `get <key>`: read a value from the shard leader owning the key
pub struct GetHandler;

#[async_trait]
impl CommandHandler for GetHandler {
    async fn execute(&self, params: &[String], client: &RouteClient) -> Result<Reply> {
        let [key] = params else {
            return Err(RouterError::WrongArgCount("get".to_string()));
        };

        let leader_addr = client
            .resolve_leader(key.as_bytes())
            .await
            .ok_or_else(|| RouterError::UnresolvedLeader(key.clone()))?;
        debug!(%leader_addr, "sending get to leader");

        let chan = client.registry().get_or_create(&leader_addr);
        let req = ClientOperationReq {
            kvs: vec![KvPair::new(OpType::Get, key.clone(), "")],
        };
        let resp = chan.client_operation(req).await?;
        if !resp.success {
            return Err(RouterError::Transport("get operation rejected".to_string()));
        }

        Ok(match resp.kvs.first() {
            Some(kv) if kv.found => Reply::bulk(kv.value.clone()),
            _ => Reply::nil(),
        })
    }
}
