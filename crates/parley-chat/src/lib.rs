//! Threaded messaging core: thread lifecycle, the message ledger with read
//! receipts and per-viewer hides, reaction aggregation, unread counts and
//! notification fan-out.
//!
//! Every operation hangs off [`Chat`]. Store access goes through `spawn_blocking`
//! with a per-call timeout; live pushes go through an injected [`SessionDirectory`].

pub mod error;
mod fanout;
mod friends;
mod inbox;
mod ledger;
pub mod live;
mod reactions;
mod registry;
mod store;
mod unread;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use parley_db::Database;

pub use error::{ChatError, Result};
pub use fanout::{MAX_BODY_CHARS, NotificationDraft, truncate_body};
pub use ledger::{MAX_CONTENT_CHARS, ReadTarget, sniff_attachment_kind};
pub use live::{SessionDirectory, SessionHandle};
pub use reactions::{ReactionToken, group_reactions};

use crate::store::Store;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Caller identity as established by the auth layer.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
}

impl Actor {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

#[derive(Clone)]
pub struct Chat {
    inner: Arc<ChatInner>,
}

struct ChatInner {
    store: Store,
    directory: Arc<dyn SessionDirectory>,
}

impl Chat {
    pub fn new(
        db: Arc<Database>,
        directory: Arc<dyn SessionDirectory>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ChatInner {
                store: Store::new(db, store_timeout),
                directory,
            }),
        }
    }

    pub fn directory(&self) -> &Arc<dyn SessionDirectory> {
        &self.inner.directory
    }

    pub(crate) fn store(&self) -> &Store {
        &self.inner.store
    }
}

/// Nil ids stand in for a missing identity.
pub(crate) fn require_identity(user_id: Uuid) -> Result<()> {
    if user_id.is_nil() {
        return Err(ChatError::NotAuthorized("Unauthorized".into()));
    }
    Ok(())
}
