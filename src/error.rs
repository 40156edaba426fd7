use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Lister is shut down")]
    Closed,

    #[error("Source error: {0}")]
    Source(#[from] anyhow::Error),
}
