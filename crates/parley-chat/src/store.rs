use std::sync::Arc;
use std::time::Duration;

use tracing::error;

use parley_db::Database;

use crate::error::{ChatError, Result};

/// Runs blocking store calls off the async runtime, bounded by a per-call timeout.
#[derive(Clone)]
pub(crate) struct Store {
    db: Arc<Database>,
    timeout: Duration,
}

impl Store {
    pub fn new(db: Arc<Database>, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    /// `op` names the call in logs. Store errors, panics in the blocking task and
    /// timeouts all come back as `Transient`.
    pub async fn call<F, T>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let task = tokio::task::spawn_blocking(move || f(db.as_ref()));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => {
                error!("Store call {} failed: {:#}", op, e);
                Err(ChatError::Transient("Storage is temporarily unavailable".into()))
            }
            Ok(Err(e)) => {
                error!("spawn_blocking join error in {}: {}", op, e);
                Err(ChatError::Transient("Storage is temporarily unavailable".into()))
            }
            Err(_) => {
                error!("Store call {} timed out after {:?}", op, self.timeout);
                Err(ChatError::Transient("Storage request timed out".into()))
            }
        }
    }
}
