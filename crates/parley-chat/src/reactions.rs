use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use parley_types::api::{MessageReactions, ReactionGroup};
use parley_types::models::{NotificationType, RefType};

use crate::error::{ChatError, Result};
use crate::fanout::NotificationDraft;
use crate::{Actor, Chat, require_identity};

const MAX_EMOJI_CHARS: usize = 32;

/// One user's reaction, stored as `user_id:emoji`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionToken {
    pub user_id: Uuid,
    pub emoji: String,
}

impl ReactionToken {
    pub fn new(user_id: Uuid, emoji: impl Into<String>) -> Self {
        Self {
            user_id,
            emoji: emoji.into(),
        }
    }

    /// Splits on the first `:` only. User ids never contain one; emoji
    /// shortcodes may.
    pub fn parse(raw: &str) -> Option<Self> {
        let (user, emoji) = raw.split_once(':')?;
        if emoji.is_empty() {
            return None;
        }
        Some(Self {
            user_id: user.parse().ok()?,
            emoji: emoji.to_string(),
        })
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ReactionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_id, self.emoji)
    }
}

/// Group raw tokens by emoji. Groups come out in order of first appearance,
/// user ids in insertion order. Unparseable tokens are skipped.
pub fn group_reactions(tokens: &[String]) -> Vec<ReactionGroup> {
    let mut groups: Vec<ReactionGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for raw in tokens {
        let Some(token) = ReactionToken::parse(raw) else {
            warn!("Skipping malformed reaction token '{}'", raw);
            continue;
        };
        match index.get(&token.emoji) {
            Some(&i) => {
                groups[i].count += 1;
                groups[i].user_ids.push(token.user_id);
            }
            None => {
                index.insert(token.emoji.clone(), groups.len());
                groups.push(ReactionGroup {
                    emoji: token.emoji,
                    count: 1,
                    user_ids: vec![token.user_id],
                });
            }
        }
    }
    groups
}

fn validate_emoji(emoji: &str) -> Result<String> {
    let emoji = emoji.trim();
    if emoji.is_empty() {
        return Err(ChatError::validation("Reaction is required"));
    }
    if emoji.chars().count() > MAX_EMOJI_CHARS {
        return Err(ChatError::validation("Reaction is too long"));
    }
    Ok(emoji.to_string())
}

impl Chat {
    /// Add the caller's reaction and notify the message's sender, unless the
    /// sender is reacting to their own message.
    pub async fn add_reaction(&self, actor: &Actor, message_id: Uuid, emoji: &str) -> Result<MessageReactions> {
        require_identity(actor.id)?;
        let emoji = validate_emoji(emoji)?;
        let (message, thread) = self.visible_message(message_id, actor.id).await?;

        let token = ReactionToken::new(actor.id, emoji.as_str()).encode();
        let now = Utc::now();
        let inserted = self
            .store()
            .call("insert_reaction", move |db| db.insert_reaction(message_id, &token, now))
            .await?;
        if !inserted {
            return Err(ChatError::Conflict("You have already added this reaction".into()));
        }

        if message.sender_id != actor.id {
            let draft = NotificationDraft::new(
                NotificationType::Message,
                format!("{} reacted to your message", actor.name),
            )
            .body(format!("Reacted with {}", emoji))
            .refers_to(RefType::Thread, thread.id);
            self.notify_user(message.sender_id, draft).await;
        }

        self.grouped_reactions(message_id).await
    }

    pub async fn remove_reaction(&self, user_id: Uuid, message_id: Uuid, emoji: &str) -> Result<MessageReactions> {
        require_identity(user_id)?;
        let emoji = validate_emoji(emoji)?;
        self.visible_message(message_id, user_id).await?;

        let token = ReactionToken::new(user_id, emoji).encode();
        let removed = self
            .store()
            .call("delete_reaction", move |db| db.delete_reaction(message_id, &token))
            .await?;
        if !removed {
            return Err(ChatError::not_found("Reaction not found"));
        }

        self.grouped_reactions(message_id).await
    }

    pub async fn reactions(&self, viewer_id: Uuid, message_id: Uuid) -> Result<MessageReactions> {
        require_identity(viewer_id)?;
        let (message, _) = self.visible_message(message_id, viewer_id).await?;
        Ok(MessageReactions {
            message_id,
            reactions: group_reactions(&message.reactions),
        })
    }

    async fn grouped_reactions(&self, message_id: Uuid) -> Result<MessageReactions> {
        let tokens = self
            .store()
            .call("reaction_tokens", move |db| db.reaction_tokens(message_id))
            .await?;
        Ok(MessageReactions {
            message_id,
            reactions: group_reactions(&tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_splits_on_first_colon() {
        let user = Uuid::new_v4();
        let token = ReactionToken::parse(&format!("{}:thumbs:up", user)).unwrap();
        assert_eq!(token.user_id, user);
        assert_eq!(token.emoji, "thumbs:up");
        assert_eq!(token.encode(), format!("{}:thumbs:up", user));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(ReactionToken::parse("no-colon").is_none());
        assert!(ReactionToken::parse("not-a-uuid:👍").is_none());
        assert!(ReactionToken::parse(&format!("{}:", Uuid::new_v4())).is_none());
    }

    #[test]
    fn groups_follow_first_appearance() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let tokens = vec![
            format!("{}:❤️", b),
            format!("{}:👍", a),
            "garbage".to_string(),
            format!("{}:❤️", c),
            format!("{}:❤️", a),
        ];

        let groups = group_reactions(&tokens);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].emoji, "❤️");
        assert_eq!(groups[0].count, 3);
        assert_eq!(groups[0].user_ids, vec![b, c, a]);
        assert_eq!(groups[1].emoji, "👍");
        assert_eq!(groups[1].user_ids, vec![a]);
    }

    #[test]
    fn group_counts_sum_to_valid_tokens() {
        let tokens: Vec<String> = (0..20)
            .map(|i| format!("{}:{}", Uuid::new_v4(), ["a", "b", "c"][i % 3]))
            .collect();
        let total: usize = group_reactions(&tokens).iter().map(|g| g.count).sum();
        assert_eq!(total, tokens.len());
    }

    #[test]
    fn emoji_is_bounded() {
        assert!(validate_emoji(" 👍 ").is_ok());
        assert!(validate_emoji("").is_err());
        assert!(validate_emoji(&"x".repeat(MAX_EMOJI_CHARS + 1)).is_err());
    }
}
