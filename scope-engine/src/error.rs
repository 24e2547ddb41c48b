use scopes_results_model::ReconcileError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("search {ticket} is no longer current")]
    StaleSearch { ticket: u64 },

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("scope driver has stopped")]
    DriverStopped,
}

pub type Result<T> = std::result::Result<T, EngineError>;
