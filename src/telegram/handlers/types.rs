//! Handler types and dependencies

use std::sync::Arc;

use crate::notify::Notifier;
use crate::storage::db::DbPool;
use crate::telegram::session::SessionStore;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub sessions: Arc<SessionStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl HandlerDeps {
    pub fn new(db_pool: Arc<DbPool>, sessions: Arc<SessionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db_pool,
            sessions,
            notifier,
        }
    }
}
