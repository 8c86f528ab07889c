pub mod session;

use self::session::Session;
use crate::cluster::RouteClient;
use crate::command::Dispatcher;
use crate::error::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Front-end proxy server: accepts client connections and runs one
/// session per connection. The routing client and dispatcher are shared
/// across all sessions.
pub struct ProxyServer {
    addr: String,
    client: Arc<RouteClient>,
    dispatcher: Arc<Dispatcher>,
}

impl ProxyServer {
    pub fn new(addr: String, client: RouteClient) -> Self {
        Self {
            addr,
            client: Arc::new(client),
            dispatcher: Arc::new(Dispatcher::new()),
        }
    }

    /// Run the accept loop
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        info!("kvrouter proxy listening on {}", self.addr);

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    info!("new connection from {}", peer);
                    let client = Arc::clone(&self.client);
                    let dispatcher = Arc::clone(&self.dispatcher);

                    tokio::spawn(async move {
                        let mut session = Session::new(stream, client, dispatcher);
                        if let Err(e) = session.handle().await {
                            error!("session error: {}", e);
                        }
                        info!("connection closed: {}", peer);
                    });
                }
                Err(e) => {
                    error!("failed to accept connection: {}", e);
                }
            }
        }
    }
}
