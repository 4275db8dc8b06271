//! Error types for yt-trends

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Coarse classification used for exit codes and log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Credential errors
    CookieLoad,
    BrowserUnavailable,
    InvalidCredentials,
    ChallengeRequired,
    LoginTimeout,
    DriverError,

    // Network / upstream errors
    NetworkError,
    YouTubeApiError,
    StorageError,

    // Dependency errors
    MissingDependency,

    // User errors
    InvalidConfig,

    // System errors
    FileError,
    SpawnError,
}

/// Failure to obtain cookies from a file or a browser profile.
///
/// Always recoverable: the credential selector logs it and moves on to the next source.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cookie file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("no usable cookies in {}", .0.display())]
    Empty(PathBuf),

    #[error("browser cookies unavailable for {browser}: {reason}")]
    BrowserUnavailable { browser: String, reason: String },

    #[error("cookie I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cookie database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Failure of the live sign-in flow
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("sign-in rejected the supplied credentials")]
    InvalidCredentials,

    #[error("sign-in requires an interactive challenge: {0}")]
    ChallengeRequired(String),

    #[error("sign-in did not complete within {0:?}")]
    Timeout(Duration),

    #[error("webdriver error: {0}")]
    Driver(String),
}

impl AuthError {
    /// Only a timeout is worth another attempt with the same credentials
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Main error type for yt-trends
#[derive(Error, Debug)]
pub enum TrendsError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("YouTube API error: {0}")]
    YouTubeApi(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Missing dependency: {0}. Please install it.")]
    MissingDependency(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Token signing error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl TrendsError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Load(LoadError::BrowserUnavailable { .. }) => ErrorCode::BrowserUnavailable,
            Self::Load(_) => ErrorCode::CookieLoad,
            Self::Auth(AuthError::InvalidCredentials) => ErrorCode::InvalidCredentials,
            Self::Auth(AuthError::ChallengeRequired(_)) => ErrorCode::ChallengeRequired,
            Self::Auth(AuthError::Timeout(_)) => ErrorCode::LoginTimeout,
            Self::Auth(AuthError::Driver(_)) => ErrorCode::DriverError,
            Self::YouTubeApi(_) => ErrorCode::YouTubeApiError,
            Self::Storage(_) | Self::Jwt(_) => ErrorCode::StorageError,
            Self::MissingDependency(_) => ErrorCode::MissingDependency,
            Self::InvalidConfig(_) => ErrorCode::InvalidConfig,
            Self::File(_) => ErrorCode::FileError,
            Self::Spawn(_) => ErrorCode::SpawnError,
            Self::Http(_) => ErrorCode::NetworkError,
            Self::Json(_) => ErrorCode::YouTubeApiError,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrendsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeout_is_retryable() {
        assert!(AuthError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!AuthError::InvalidCredentials.is_retryable());
        assert!(!AuthError::ChallengeRequired("2fa".into()).is_retryable());
        assert!(!AuthError::Driver("gone".into()).is_retryable());
    }

    #[test]
    fn codes_follow_the_wrapped_error() {
        let err: TrendsError = AuthError::ChallengeRequired("captcha".into()).into();
        assert_eq!(err.code(), ErrorCode::ChallengeRequired);

        let err: TrendsError = LoadError::BrowserUnavailable {
            browser: "firefox".into(),
            reason: "no profile".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::BrowserUnavailable);

        let err: TrendsError = LoadError::Missing("x.txt".into()).into();
        assert_eq!(err.code(), ErrorCode::CookieLoad);
    }
}
