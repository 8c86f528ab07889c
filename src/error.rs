use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Cluster sync failed: {0}")]
    Sync(String),

    #[error("No leader resolved for key '{0}'")]
    UnresolvedLeader(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("wrong number of arguments for '{0}' command")]
    WrongArgCount(String),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, RouterError>;
