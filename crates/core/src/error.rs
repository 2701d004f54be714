#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnvValue { name: &'static str, value: String },
    #[error(transparent)]
    Files(#[from] filing_files::FilesError),
    #[error("failed to start rescan command: {0}")]
    NotifierSpawn(std::io::Error),
    #[error("rescan command exited with {status}: {stderr}")]
    NotifierFailed {
        status: std::process::ExitStatus,
        stderr: String,
    },
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
