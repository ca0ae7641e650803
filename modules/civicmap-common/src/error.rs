use thiserror::Error;

#[derive(Error, Debug)]
pub enum CivicMapError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication required")]
    AuthRequired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Image upload error: {0}")]
    ImageUpload(String),

    #[error("Offline queue error: {0}")]
    Queue(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl CivicMapError {
    /// True for failures the read path degrades on (cache fallback)
    /// instead of surfacing to the user.
    pub fn is_degradable(&self) -> bool {
        matches!(self, CivicMapError::Store(_))
    }
}
