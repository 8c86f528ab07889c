use super::CommandHandler;
use crate::cluster::RouteClient;
use crate::error::Result;
use crate::protocol::Reply;
use async_trait::async_trait;

/// `info`: render the cached topology snapshot. Local only, no remote
/// call; what it prints is the client's current belief, which the
/// resolver re-confirms per operation anyway.
pub struct InfoHandler;

#[async_trait]
impl CommandHandler for InfoHandler {
    async fn execute(&self, _params: &[String], client: &RouteClient) -> Result<Reply> {
        let snapshot = client.topology_snapshot();

        let mut out = String::new();
        out.push_str("# Cluster\r\n");
        out.push_str(&format!("shard_groups:{}\r\n", snapshot.groups.len()));
        for group in &snapshot.groups {
            let slots: Vec<String> = group.slots.iter().map(|r| r.to_string()).collect();
            let members: Vec<String> = group
                .servers
                .iter()
                .map(|s| format!("{}@{}", s.id, s.address))
                .collect();
            out.push_str(&format!(
                "shard_group:{} slots:{} leader_id:{} members:{}\r\n",
                group.id,
                slots.join(","),
                group.leader_id,
                members.join(",")
            ));
        }

        Ok(Reply::bulk(out))
    }
}

/// `ping`: liveness check answered locally
pub struct PingHandler;

#[async_trait]
impl CommandHandler for PingHandler {
    async fn execute(&self, _params: &[String], _client: &RouteClient) -> Result<Reply> {
        Ok(Reply::simple("PONG"))
    }
}
