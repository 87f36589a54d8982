use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use parley_types::api::{FileRef, ThreadAttachment, ThreadDetail};
use parley_types::models::{
    Attachment, AttachmentKind, ContentType, Message, NotificationType, RefType, Thread,
};

use crate::error::{ChatError, Result};
use crate::fanout::{NotificationDraft, truncate_body};
use crate::registry::NOT_A_MEMBER;
use crate::{Actor, Chat, require_identity};

pub const MAX_CONTENT_CHARS: usize = 2000;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg", "heic"];

/// What a mark-read call applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTarget {
    Message(Uuid),
    Thread(Uuid),
}

/// `image` when the mime type or the url's extension says so, `file` otherwise.
pub fn sniff_attachment_kind(mime: Option<&str>, url: &str) -> AttachmentKind {
    if let Some(mime) = mime {
        if mime.trim().to_ascii_lowercase().starts_with("image/") {
            return AttachmentKind::Image;
        }
    }

    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path
        .rsplit_once('/')
        .map_or(path, |(_, name)| name)
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match ext {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => AttachmentKind::Image,
        _ => AttachmentKind::File,
    }
}

/// Trimmed content, or a validation error if it is empty or too long.
fn validate_content(content: &str) -> Result<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ChatError::validation("Message content cannot be empty"));
    }
    if trimmed.chars().count() > MAX_CONTENT_CHARS {
        return Err(ChatError::validation(format!(
            "Message content exceeds maximum length of {} characters",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

fn message_title(sender: &Actor) -> String {
    format!("New message from {}", sender.name)
}

impl Chat {
    // -- Sending --

    /// Append a text message. With no `thread_id` the direct thread with
    /// `recipient_id` is found or created first. Content is checked before any
    /// thread is touched.
    pub async fn send_text(
        &self,
        sender: &Actor,
        thread_id: Option<Uuid>,
        recipient_id: Option<Uuid>,
        content: &str,
    ) -> Result<Message> {
        require_identity(sender.id)?;
        let content = validate_content(content)?;

        let thread = match (thread_id, recipient_id) {
            (Some(thread_id), _) => self.assert_member(thread_id, sender.id).await?,
            (None, Some(recipient_id)) => {
                let thread = self.resolve_or_create_direct(sender.id, recipient_id).await?;
                // The pair thread outlives a `leave`; the sender must still be in it.
                if !thread.is_member(sender.id) {
                    return Err(ChatError::not_found(NOT_A_MEMBER));
                }
                thread
            }
            (None, None) => {
                return Err(ChatError::validation("Thread ID or recipient ID is required"));
            }
        };

        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            thread_id: thread.id,
            sender_id: sender.id,
            content_type: ContentType::Text,
            content: Some(content.clone()),
            attachments: Vec::new(),
            reactions: Vec::new(),
            read_by: vec![sender.id],
            deleted_for: Vec::new(),
            created_at: now,
        };

        self.append(&thread, sender.id, vec![message.clone()], now).await?;

        let draft = NotificationDraft::new(NotificationType::Message, message_title(sender))
            .body(truncate_body(&content))
            .refers_to(RefType::Thread, thread.id);
        self.notify_members(&thread, sender.id, draft).await;

        Ok(message)
    }

    /// One message per file, in upload order. A non-blank caption is written
    /// as its own text message ahead of the files; the last file becomes the
    /// thread's last message.
    pub async fn send_with_attachments(
        &self,
        sender: &Actor,
        thread_id: Uuid,
        content: Option<&str>,
        files: &[FileRef],
    ) -> Result<Vec<Message>> {
        require_identity(sender.id)?;
        if files.is_empty() {
            return Err(ChatError::validation("No files uploaded"));
        }
        if files.iter().any(|f| f.url.trim().is_empty()) {
            return Err(ChatError::validation("File URL is required"));
        }
        let caption = match content {
            Some(text) if !text.trim().is_empty() => Some(validate_content(text)?),
            _ => None,
        };

        let thread = self.assert_member(thread_id, sender.id).await?;

        let now = Utc::now();
        let new_message = |content_type: ContentType,
                           content: Option<String>,
                           attachments: Vec<Attachment>| Message {
            id: Uuid::new_v4(),
            thread_id: thread.id,
            sender_id: sender.id,
            content_type,
            content,
            attachments,
            reactions: Vec::new(),
            read_by: vec![sender.id],
            deleted_for: Vec::new(),
            created_at: now,
        };

        // Caption first, then one message per file; the last file becomes the thread's latest.
        let mut messages = Vec::with_capacity(files.len() + 1);
        if let Some(text) = &caption {
            messages.push(new_message(ContentType::Text, Some(text.clone()), Vec::new()));
        }
        for file in files {
            let url = file.url.trim().to_string();
            let attachment = Attachment {
                kind: sniff_attachment_kind(file.mime.as_deref(), &url),
                mime: file.mime.clone(),
                url,
            };
            messages.push(new_message(ContentType::File, None, vec![attachment]));
        }

        self.append(&thread, sender.id, messages.clone(), now).await?;

        let body = match &caption {
            Some(text) => truncate_body(text),
            None if files.len() == 1 => "Sent a file".to_string(),
            None => format!("Sent {} files", files.len()),
        };
        let draft = NotificationDraft::new(NotificationType::Message, message_title(sender))
            .body(body)
            .refers_to(RefType::Thread, thread.id);
        self.notify_members(&thread, sender.id, draft).await;

        Ok(messages)
    }

    async fn append(
        &self,
        thread: &Thread,
        sender_id: Uuid,
        messages: Vec<Message>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let thread_id = thread.id;
        self.store()
            .call("append_messages", move |db| {
                db.append_messages(thread_id, sender_id, &messages, at)
            })
            .await
    }

    // -- Reading --

    /// Record read receipts. Returns how many were newly added.
    pub async fn mark_read(&self, user_id: Uuid, target: ReadTarget) -> Result<usize> {
        require_identity(user_id)?;
        let now = Utc::now();

        match target {
            ReadTarget::Message(message_id) => {
                let (message, thread) = self.visible_message(message_id, user_id).await?;
                let (message_id, thread_id) = (message.id, thread.id);
                let added = self
                    .store()
                    .call("mark_message_read", move |db| {
                        db.mark_message_read(message_id, thread_id, user_id, now)
                    })
                    .await?;
                Ok(usize::from(added))
            }
            ReadTarget::Thread(thread_id) => {
                let thread = self.assert_member(thread_id, user_id).await?;
                let thread_id = thread.id;
                self.store()
                    .call("mark_thread_read", move |db| {
                        db.mark_thread_read(thread_id, user_id, now)
                    })
                    .await
            }
        }
    }

    /// The message and its thread, as long as `viewer_id` is a member and has
    /// not hidden it.
    pub(crate) async fn visible_message(&self, message_id: Uuid, viewer_id: Uuid) -> Result<(Message, Thread)> {
        let message = self.load_message(message_id).await?;
        if message.is_hidden_for(viewer_id) {
            return Err(ChatError::not_found("Message not found"));
        }
        let thread = self.assert_member(message.thread_id, viewer_id).await?;
        Ok((message, thread))
    }

    async fn load_message(&self, message_id: Uuid) -> Result<Message> {
        self.store()
            .call("get_message", move |db| db.get_message(message_id))
            .await?
            .ok_or_else(|| ChatError::not_found("Message not found"))
    }

    // -- Removal --

    /// Hard-delete one of the caller's own messages. Returns the thread's last
    /// message afterwards.
    pub async fn delete_for_self(&self, message_id: Uuid, user_id: Uuid) -> Result<Option<Uuid>> {
        require_identity(user_id)?;
        let message = self.load_message(message_id).await?;
        if message.sender_id != user_id {
            return Err(ChatError::Forbidden(
                "You can only delete your own messages".into(),
            ));
        }
        let thread = self.assert_member(message.thread_id, user_id).await?;

        let thread_id = thread.id;
        let now = Utc::now();
        let last = self
            .store()
            .call("delete_message", move |db| {
                db.delete_message(message_id, thread_id, now)
            })
            .await?;
        info!("{} deleted message {} in thread {}", user_id, message_id, thread_id);
        Ok(last)
    }

    /// Hide a message from the caller's own view. Other members still see it.
    pub async fn hide_for_self(&self, message_id: Uuid, user_id: Uuid) -> Result<()> {
        require_identity(user_id)?;
        let message = self.load_message(message_id).await?;
        self.assert_member(message.thread_id, user_id).await?;

        let now = Utc::now();
        self.store()
            .call("hide_message", move |db| db.hide_message(message_id, user_id, now))
            .await?;
        Ok(())
    }

    // -- Views --

    pub async fn get_thread_detail(&self, thread_id: Uuid, viewer_id: Uuid) -> Result<ThreadDetail> {
        let thread = self.assert_member(thread_id, viewer_id).await?;
        let messages = self
            .store()
            .call("list_thread_messages", move |db| {
                db.list_thread_messages(thread_id, viewer_id)
            })
            .await?;
        Ok(ThreadDetail { thread, messages })
    }

    /// Every attachment the viewer can see in the thread, newest first.
    pub async fn list_attachments(&self, thread_id: Uuid, viewer_id: Uuid) -> Result<Vec<ThreadAttachment>> {
        self.assert_member(thread_id, viewer_id).await?;
        let messages = self
            .store()
            .call("list_attachment_messages", move |db| {
                db.list_attachment_messages(thread_id, viewer_id)
            })
            .await?;

        Ok(messages
            .into_iter()
            .flat_map(|message| {
                let (message_id, sender_id, created_at) =
                    (message.id, message.sender_id, message.created_at);
                message
                    .attachments
                    .into_iter()
                    .map(move |attachment| ThreadAttachment {
                        message_id,
                        sender_id,
                        created_at,
                        attachment,
                    })
            })
            .collect())
    }
}
