use super::CommandHandler;
use crate::cluster::{ClientOperationReq, KvPair, OpType, RouteClient};
use crate::error::{Result, RouterError};
use crate::protocol::Reply;
use async_trait::async_trait;
use tracing::debug;

/// `set <key> <value>`: write a key-value pair through the shard leader
pub struct SetHandler;

#[async_trait]
impl CommandHandler for SetHandler {
    async fn execute(&self, params: &[String], client: &RouteClient) -> Result<Reply> {
        let [key, value] = params else {
            return Err(RouterError::WrongArgCount("set".to_string()));
        };

        let leader_addr = client
            .resolve_leader(key.as_bytes())
            .await
            .ok_or_else(|| RouterError::UnresolvedLeader(key.clone()))?;
        debug!(%leader_addr, "sending set to leader");

        let chan = client.registry().get_or_create(&leader_addr);
        let req = ClientOperationReq {
            kvs: vec![KvPair::new(OpType::Put, key.clone(), value.clone())],
        };
        let resp = chan.client_operation(req).await?;
        if !resp.success {
            return Err(RouterError::Transport("set operation rejected".to_string()));
        }

        Ok(Reply::ok())
    }
}
