use crate::report::SimReport;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid task set: {0}")]
    InvalidTaskSet(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("simulation exceeded {max_ticks} ticks without terminating")]
    Divergence {
        max_ticks: u64,
        /// Timeline and metrics up to the last completed tick.
        partial: Box<SimReport>,
    },

    #[error("deadlock cycle could not be resolved at tick {tick}")]
    DeadlockUnresolved { tick: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn task_set<S: Into<String>>(msg: S) -> Self {
        Error::InvalidTaskSet(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::InvalidConfig(msg.into())
    }
}
