use crate::cluster::RouteClient;
use crate::command::Dispatcher;
use crate::error::Result;
use crate::protocol::{CommandParser, Reply};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// One client session. Exactly one command is in flight at a time:
/// parse, dispatch, reply, reset, then the next command may be parsed.
pub struct Session {
    stream: TcpStream,
    parser: CommandParser,
    client: Arc<RouteClient>,
    dispatcher: Arc<Dispatcher>,
}

impl Session {
    pub fn new(stream: TcpStream, client: Arc<RouteClient>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            stream,
            parser: CommandParser::new(4096),
            client,
            dispatcher,
        }
    }

    pub async fn handle(&mut self) -> Result<()> {
        loop {
            let n = self.stream.read_buf(self.parser.buffer_mut()).await?;
            if n == 0 {
                return Ok(());
            }

            loop {
                match self.parser.parse() {
                    Ok(Some(params)) => {
                        debug!(verb = params.first().map(String::as_str), "dispatching command");
                        let reply = self.dispatcher.dispatch(&params, &self.client).await;
                        self.write_reply(reply).await?;
                        self.maybe_resync().await;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        // Malformed request: error reply, drop buffered
                        // bytes, session stays usable
                        self.write_reply(Reply::error(format!("ERR {}", e))).await?;
                        self.parser.reset();
                        break;
                    }
                }
            }
        }
    }

    /// One best-effort topology resync when a resolution found the cached
    /// slot mapping stale. The failed command itself is never retried.
    async fn maybe_resync(&self) {
        if self.client.take_stale() {
            if let Err(e) = self.client.resync().await {
                warn!("opportunistic topology resync failed: {}", e);
            }
        }
    }

    async fn write_reply(&mut self, reply: Reply) -> Result<()> {
        let data = reply.serialize();
        self.stream.write_all(&data).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
