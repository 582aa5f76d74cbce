use once_cell::sync::Lazy;
use std::env;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: tendersbot.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "tendersbot.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: tendersbot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "tendersbot.log".to_string()));

/// Root directory for stored files: node content under nodes_content/,
/// user uploads under user_uploads/
/// Read from FILES_ROOT environment variable
/// Default: files
pub static FILES_ROOT: Lazy<String> = Lazy::new(|| env::var("FILES_ROOT").unwrap_or_else(|_| "files".to_string()));

/// Resolves a path stored in the database (relative to FILES_ROOT) to an
/// on-disk location.
pub fn files_path(relative: &str) -> std::path::PathBuf {
    std::path::Path::new(FILES_ROOT.as_str()).join(relative)
}

/// Number of tokio worker threads handling updates
/// Read from WORKER_THREADS environment variable
/// Default: 10
pub static WORKER_THREADS: Lazy<usize> = Lazy::new(|| {
    env::var("WORKER_THREADS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10)
});

/// Template for user-visible feedback reference numbers; `{id}` is replaced
/// with the record id
/// Read from FEEDBACK_ID_FORMAT environment variable
/// Default: GKE-{id}
pub static FEEDBACK_ID_FORMAT: Lazy<String> =
    Lazy::new(|| env::var("FEEDBACK_ID_FORMAT").unwrap_or_else(|_| "GKE-{id}".to_string()));

/// Formats a feedback record id into the user-visible reference number.
pub fn format_feedback_id(id: i64) -> String {
    FEEDBACK_ID_FORMAT.replace("{id}", &id.to_string())
}

/// Upload quota configuration
pub mod uploads {
    use once_cell::sync::Lazy;
    use std::env;

    /// Per-file size cap in megabytes
    /// Read from MAX_FILE_SIZE_MB environment variable
    /// Default: 3
    pub static MAX_FILE_SIZE_MB: Lazy<u64> = Lazy::new(|| {
        env::var("MAX_FILE_SIZE_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3)
    });

    /// Aggregate size cap per feedback in megabytes
    /// Read from MAX_TOTAL_SIZE_MB environment variable
    /// Default: 15
    pub static MAX_TOTAL_SIZE_MB: Lazy<u64> = Lazy::new(|| {
        env::var("MAX_TOTAL_SIZE_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15)
    });

    /// Per-file cap in bytes
    pub fn max_file_size_bytes() -> u64 {
        *MAX_FILE_SIZE_MB * 1024 * 1024
    }

    /// Aggregate cap in bytes
    pub fn max_total_size_bytes() -> u64 {
        *MAX_TOTAL_SIZE_MB * 1024 * 1024
    }
}

/// Email notification configuration
pub mod email {
    use once_cell::sync::Lazy;
    use std::env;
    use std::time::Duration;

    /// SMTP host; notifications are disabled when unset
    pub static HOST: Lazy<Option<String>> = Lazy::new(|| {
        env::var("EMAIL_HOST")
            .ok()
            .and_then(|s| if s.trim().is_empty() { None } else { Some(s) })
    });

    /// SMTP port
    /// Read from EMAIL_PORT environment variable
    /// Default: 465
    pub static PORT: Lazy<u16> = Lazy::new(|| env::var("EMAIL_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(465));

    /// Use implicit TLS (SMTPS); when false, STARTTLS is used instead
    /// Read from EMAIL_USE_SSL environment variable
    /// Default: true
    pub static USE_SSL: Lazy<bool> = Lazy::new(|| {
        env::var("EMAIL_USE_SSL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true)
    });

    /// SMTP auth user; auth is skipped when empty
    pub static HOST_USER: Lazy<String> = Lazy::new(|| env::var("EMAIL_HOST_USER").unwrap_or_else(|_| String::new()));

    /// SMTP auth password
    pub static HOST_PASSWORD: Lazy<String> =
        Lazy::new(|| env::var("EMAIL_HOST_PASSWORD").unwrap_or_else(|_| String::new()));

    /// Sender address for notification mail
    pub static DEFAULT_FROM: Lazy<String> =
        Lazy::new(|| env::var("DEFAULT_FROM_EMAIL").unwrap_or_else(|_| String::new()));

    /// Recipient list for feedback notifications (comma-separated)
    pub static FEEDBACK_TO: Lazy<Vec<String>> = Lazy::new(|| {
        env::var("MAIL_FEEDBACK_TO")
            .unwrap_or_else(|_| String::new())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    });

    /// SMTP connection timeout (seconds)
    pub const TIMEOUT_SECS: u64 = 10;

    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}
