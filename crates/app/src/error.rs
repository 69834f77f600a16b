use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] engine::EngineError),

    #[error("missing setting `{0}`")]
    MissingSetting(&'static str),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
