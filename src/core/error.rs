use thiserror::Error;

/// Centralized error types for the application
///
/// All errors in the application are converted to this enum for consistent
/// error handling. Uses `thiserror` for automatic conversion and display
/// formatting.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Telegram file download errors
    #[error("Telegram download error: {0}")]
    Download(#[from] teloxide::DownloadError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Email message construction errors
    #[error("Email error: {0}")]
    Email(#[from] lettre::error::Error),

    /// Email address parsing errors
    #[error("Email address error: {0}")]
    EmailAddress(#[from] lettre::address::AddressError),

    /// SMTP delivery errors
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// A callback payload that does not parse as a navigation token
    #[error("Malformed navigation token: {0}")]
    MalformedToken(String),

    /// A referenced menu node no longer exists
    #[error("Node {0} not found")]
    NodeNotFound(i64),

    /// No in-progress feedback for a chat that claims to have one
    #[error("No unsubmitted feedback for chat {0}")]
    FeedbackNotFound(i64),

    /// Content-tree misconfiguration (unknown input flow, missing root)
    #[error("Misconfigured content tree: {0}")]
    Misconfigured(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
