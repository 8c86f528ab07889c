use super::CommandHandler;
use crate::cluster::{ClientOperationReq, KvPair, OpType, RouteClient};
use crate::error::{Result, RouterError};
use crate::protocol::Reply;
use async_trait::async_trait;
use tracing::debug;

/// `del <key>`: delete a key through the shard leader; replies with the
/// number of keys removed (0 or 1)
pub struct DelHandler;

#[async_trait]
impl CommandHandler for DelHandler {
    async fn execute(&self, params: &[String], client: &RouteClient) -> Result<Reply> {
        let [key] = params else {
            return Err(RouterError::WrongArgCount("del".to_string()));
        };

        let leader_addr = client
            .resolve_leader(key.as_bytes())
            .await
            .ok_or_else(|| RouterError::UnresolvedLeader(key.clone()))?;
        debug!(%leader_addr, "sending del to leader");

        let chan = client.registry().get_or_create(&leader_addr);
        let req = ClientOperationReq {
            kvs: vec![KvPair::new(OpType::Del, key.clone(), "")],
        };
        let resp = chan.client_operation(req).await?;
        if !resp.success {
            return Err(RouterError::Transport("del operation rejected".to_string()));
        }

        let removed = resp.kvs.first().map(|kv| kv.found).unwrap_or(false);
        Ok(Reply::integer(removed as i64))
    }
}
