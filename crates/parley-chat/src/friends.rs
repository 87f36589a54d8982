use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use parley_types::models::{PairKey, Thread};

use crate::error::{ChatError, Result};
use crate::{Chat, require_identity};

impl Chat {
    /// Record a friendship and promote any existing stranger thread between the
    /// two. Calling it again for the same pair changes nothing.
    pub async fn accept_friendship(&self, a: Uuid, b: Uuid) -> Result<Option<Thread>> {
        require_identity(a)?;
        require_identity(b)?;
        if a == b {
            return Err(ChatError::validation("Cannot befriend yourself"));
        }

        let now = Utc::now();
        let created = self
            .store()
            .call("insert_friendship", move |db| db.insert_friendship(a, b, now))
            .await?;
        if created {
            info!("Friendship recorded between {} and {}", a, b);
        }

        self.promote_to_friend(a, b).await
    }

    pub async fn are_friends(&self, a: Uuid, b: Uuid) -> Result<bool> {
        let pair = PairKey::new(a, b);
        self.store()
            .call("are_friends", move |db| db.are_friends(&pair))
            .await
    }
}
