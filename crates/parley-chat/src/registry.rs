use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use parley_types::models::{
    MemberRole, NotificationType, PairKey, RefType, Thread, ThreadKind, ThreadMember,
};

use crate::error::{ChatError, Result};
use crate::fanout::NotificationDraft;
use crate::{Actor, Chat, require_identity};

pub(crate) const NOT_A_MEMBER: &str = "Thread not found or you are not a member";

impl Chat {
    /// Find the direct thread between two users, creating it on first contact.
    /// A new thread is `direct_friend` if the two are already friends, otherwise
    /// `direct_stranger`. The creator starts with a read watermark; the other
    /// member has none.
    pub async fn resolve_or_create_direct(&self, creator_id: Uuid, other_id: Uuid) -> Result<Thread> {
        require_identity(creator_id)?;
        require_identity(other_id)?;
        if creator_id == other_id {
            return Err(ChatError::validation("Cannot open a direct thread with yourself"));
        }

        let hash = PairKey::new(creator_id, other_id);

        let key = hash.clone();
        if let Some(thread) = self
            .store()
            .call("find_direct_thread", move |db| db.find_direct_thread(&key))
            .await?
        {
            return Ok(thread);
        }

        let key = hash.clone();
        let friends = self
            .store()
            .call("are_friends", move |db| db.are_friends(&key))
            .await?;

        let now = Utc::now();
        let thread = Thread {
            id: Uuid::new_v4(),
            kind: if friends {
                ThreadKind::DirectFriend
            } else {
                ThreadKind::DirectStranger
            },
            name: None,
            avatar: None,
            members: vec![
                ThreadMember {
                    user_id: creator_id,
                    role: MemberRole::Member,
                    last_read_at: Some(now),
                },
                ThreadMember {
                    user_id: other_id,
                    role: MemberRole::Member,
                    last_read_at: None,
                },
            ],
            member_hash: Some(hash),
            last_message_id: None,
            created_by: creator_id,
            created_at: now,
            updated_at: now,
        };

        let proposed_id = thread.id;
        let stored = self
            .store()
            .call("upsert_direct_thread", move |db| db.upsert_direct_thread(&thread))
            .await?;

        if stored.id == proposed_id {
            info!(
                "Opened {} thread {} between {} and {}",
                stored.kind, stored.id, creator_id, other_id
            );
        }
        Ok(stored)
    }

    /// The thread, if `user_id` is in it. Missing threads and non-membership
    /// produce the same error.
    pub async fn assert_member(&self, thread_id: Uuid, user_id: Uuid) -> Result<Thread> {
        require_identity(user_id)?;
        self.store()
            .call("get_thread_for_member", move |db| {
                db.get_thread_for_member(thread_id, user_id)
            })
            .await?
            .ok_or_else(|| ChatError::not_found(NOT_A_MEMBER))
    }

    /// Flip the stranger thread between two users to a friend thread. The
    /// thread is located by pair key since the friend workflow only knows the
    /// two user ids. Already-friend threads are returned unchanged; `None`
    /// means the two have never talked.
    pub async fn promote_to_friend(&self, a: Uuid, b: Uuid) -> Result<Option<Thread>> {
        let hash = PairKey::new(a, b);

        let key = hash.clone();
        let Some(thread) = self
            .store()
            .call("find_direct_thread", move |db| db.find_direct_thread(&key))
            .await?
        else {
            return Ok(None);
        };

        if thread.kind == ThreadKind::DirectFriend {
            return Ok(Some(thread));
        }
        if !thread.kind.can_transition_to(ThreadKind::DirectFriend) {
            warn!("Thread {} with pair key {} has kind {}", thread.id, hash, thread.kind);
            return Ok(None);
        }

        let now = Utc::now();
        let changed = self
            .store()
            .call("update_thread_kind", move |db| {
                db.update_thread_kind(&hash, ThreadKind::DirectStranger, ThreadKind::DirectFriend, now)
            })
            .await?;
        if changed > 0 {
            info!("Promoted thread {} to direct_friend", thread.id);
        }

        let thread_id = thread.id;
        self.store()
            .call("get_thread", move |db| db.get_thread(thread_id))
            .await
    }

    /// New group thread with the owner as admin and everyone else as member.
    /// Added members get a `group` notification.
    pub async fn create_group(
        &self,
        owner: &Actor,
        name: &str,
        member_ids: &[Uuid],
        avatar: Option<String>,
    ) -> Result<Thread> {
        require_identity(owner.id)?;

        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::validation("Group name is required"));
        }
        if member_ids.is_empty() {
            return Err(ChatError::validation("Group members are required"));
        }

        let now = Utc::now();
        let mut members = vec![ThreadMember {
            user_id: owner.id,
            role: MemberRole::Admin,
            last_read_at: Some(now),
        }];
        for &user_id in member_ids {
            if user_id.is_nil() || members.iter().any(|m| m.user_id == user_id) {
                continue;
            }
            members.push(ThreadMember {
                user_id,
                role: MemberRole::Member,
                last_read_at: None,
            });
        }
        if members.len() < 2 {
            return Err(ChatError::validation("A group needs at least one other member"));
        }

        let thread = Thread {
            id: Uuid::new_v4(),
            kind: ThreadKind::Group,
            name: Some(name.to_string()),
            avatar,
            members,
            member_hash: None,
            last_message_id: None,
            created_by: owner.id,
            created_at: now,
            updated_at: now,
        };

        let row = thread.clone();
        self.store()
            .call("insert_thread", move |db| db.insert_thread(&row))
            .await?;
        info!(
            "{} ({}) created group {} with {} members",
            owner.name,
            owner.id,
            thread.id,
            thread.members.len()
        );

        let draft = NotificationDraft::new(NotificationType::Group, format!("You were added to {}", name))
            .body(format!("{} added you to the group", owner.name))
            .refers_to(RefType::Thread, thread.id);
        self.notify_members(&thread, owner.id, draft).await;

        Ok(thread)
    }

    /// Remove `user_id` from the thread. The thread itself is kept even if it
    /// ends up empty.
    pub async fn leave(&self, thread_id: Uuid, user_id: Uuid) -> Result<()> {
        require_identity(user_id)?;
        let removed = self
            .store()
            .call("remove_member", move |db| db.remove_member(thread_id, user_id))
            .await?;
        if !removed {
            return Err(ChatError::not_found(NOT_A_MEMBER));
        }
        if let Some(handle) = self.directory().lookup(user_id) {
            self.directory().leave_room(thread_id, handle.conn_id());
        }
        info!("{} left thread {}", user_id, thread_id);
        Ok(())
    }

    /// Friend and group threads, most recently active first.
    pub async fn list_threads(&self, user_id: Uuid) -> Result<Vec<Thread>> {
        self.threads_of_kind(user_id, &[ThreadKind::DirectFriend, ThreadKind::Group])
            .await
    }

    pub async fn list_strangers(&self, user_id: Uuid) -> Result<Vec<Thread>> {
        self.threads_of_kind(user_id, &[ThreadKind::DirectStranger]).await
    }

    pub async fn list_groups(&self, user_id: Uuid) -> Result<Vec<Thread>> {
        self.threads_of_kind(user_id, &[ThreadKind::Group]).await
    }

    async fn threads_of_kind(&self, user_id: Uuid, kinds: &[ThreadKind]) -> Result<Vec<Thread>> {
        require_identity(user_id)?;
        let kinds = kinds.to_vec();
        self.store()
            .call("list_threads_for_user", move |db| {
                db.list_threads_for_user(user_id, &kinds)
            })
            .await
    }
}
