use thiserror::Error;

#[derive(Debug, Error)]
pub enum MotorError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Post Processor error: {0}")]
    PostProcessor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
