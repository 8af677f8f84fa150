use thiserror::Error;
use walletbook_config::ConfigError;
use walletbook_core::CoreError;
use walletbook_fx::FxError;

/// Anything the app context can fail with.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Exchange rates unavailable: {0}")]
    Fx(#[from] FxError),
}

impl AppError {
    /// True for rejected input as opposed to storage or network trouble.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::Core(CoreError::Validation(_)) | AppError::Config(ConfigError::Invalid(_))
        )
    }
}
