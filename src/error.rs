pub type TilecycleResult<T> = Result<T, TilecycleError>;

#[derive(thiserror::Error, Debug)]
pub enum TilecycleError {
    /// The map has unbounded dimensions; no canvas can be allocated.
    #[error("bounds error: {0}")]
    Bounds(String),

    /// The merged timeline holds more instants than the caller allows.
    #[error("timeline would produce more than {max_frames} frames")]
    TooManyFrames {
        /// The caller-supplied ceiling that was exceeded.
        max_frames: usize,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TilecycleError {
    pub fn bounds(msg: impl Into<String>) -> Self {
        Self::Bounds(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}
