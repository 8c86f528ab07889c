//! Command dispatch: one handler per verb, selected from a fixed table.

mod del;
mod get;
mod info;
mod set;

pub use del::DelHandler;
pub use get::GetHandler;
pub use info::{InfoHandler, PingHandler};
pub use set::SetHandler;

use crate::cluster::RouteClient;
use crate::error::{Result, RouterError};
use crate::protocol::Reply;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::warn;

/// A command capability: given the argument tokens and the shared
/// routing state, perform at most one remote operation and produce one
/// reply. Failures propagate as errors and are converted to an error
/// reply at the dispatch boundary; nothing escapes to the session.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, params: &[String], client: &RouteClient) -> Result<Reply>;
}

/// Verb-keyed handler table. Adding a verb means adding a table entry.
pub struct Dispatcher {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn CommandHandler>> = HashMap::new();
        handlers.insert("get", Box::new(GetHandler));
        handlers.insert("set", Box::new(SetHandler));
        handlers.insert("del", Box::new(DelHandler));
        handlers.insert("info", Box::new(InfoHandler));
        handlers.insert("ping", Box::new(PingHandler));
        Self { handlers }
    }

    /// Select a handler by the first token (case-sensitive exact match)
    /// and run it. This path always produces a reply: unknown verbs,
    /// empty commands and handler failures all end in an error reply,
    /// never a dropped request.
    pub async fn dispatch(&self, params: &[String], client: &RouteClient) -> Reply {
        let Some(verb) = params.first() else {
            return Reply::error("ERR empty command");
        };

        let result = match self.handlers.get(verb.as_str()) {
            Some(handler) => handler.execute(&params[1..], client).await,
            None => Err(RouterError::UnknownCommand(verb.clone())),
        };

        match result {
            Ok(reply) => reply,
            Err(e) => {
                warn!(%verb, "command failed: {}", e);
                error_reply(e)
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a handler failure to its user-visible reply. Routing and remote
/// failures collapse into the generic server error; argument and verb
/// mistakes keep their message.
fn error_reply(e: RouterError) -> Reply {
    match e {
        RouterError::UnresolvedLeader(_) | RouterError::Transport(_) => Reply::server_error(),
        other => Reply::error(format!("ERR {}", other)),
    }
}
