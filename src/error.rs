pub type ScrubResult<T> = Result<T, ScrubError>;

#[derive(thiserror::Error, Debug)]
pub enum ScrubError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("load error: {0}")]
    Load(String),

    #[error("trace error: {0}")]
    Trace(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScrubError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn trace(msg: impl Into<String>) -> Self {
        Self::Trace(msg.into())
    }
}
