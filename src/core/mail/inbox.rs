use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{Email, MailError};

const MOCK_EMAILS: &str = include_str!("mock_emails.json");

/// Inbox shared between tool handlers, REST actions and the mail provider
pub type SharedInbox = Arc<RwLock<Inbox>>;

/// User-facing inbox actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InboxAction {
    Delete,
    Reply,
    Skip,
    MarkUnread,
}

/// Outcome of an inbox action, shown to the user as a short confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub email_subject: String,
    pub action: InboxAction,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<bool>,
}

/// Ordered email collection plus the current selection.
///
/// Insertion order is the display order and is never re-sorted.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    emails: Vec<Email>,
    selected: Option<String>,
}

impl Inbox {
    pub fn new(emails: Vec<Email>) -> Self {
        let selected = emails.first().map(|email| email.email_id.clone());
        Self { emails, selected }
    }

    /// Inbox seeded with the bundled demo mails
    pub fn with_mock_data() -> Self {
        let emails = serde_json::from_str::<Vec<Email>>(MOCK_EMAILS).unwrap_or_else(|e| {
            error!("Failed to parse bundled mock emails: {}", e);
            Vec::new()
        });
        Self::new(emails)
    }

    /// Inbox seeded from a JSON array of emails on disk
    pub fn from_json_file(path: &std::path::Path) -> Result<Self, MailError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MailError::Provider(format!("failed to read {}: {e}", path.display()))
        })?;
        let emails = serde_json::from_str::<Vec<Email>>(&contents).map_err(|e| {
            MailError::Provider(format!("failed to parse {}: {e}", path.display()))
        })?;
        debug!(count = emails.len(), "Loaded inbox fixtures");
        Ok(Self::new(emails))
    }

    pub fn into_shared(self) -> SharedInbox {
        Arc::new(RwLock::new(self))
    }

    pub fn emails(&self) -> &[Email] {
        &self.emails
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    pub fn get(&self, email_id: &str) -> Option<&Email> {
        self.emails.iter().find(|email| email.email_id == email_id)
    }

    fn get_mut(&mut self, email_id: &str) -> Option<&mut Email> {
        self.emails.iter_mut().find(|email| email.email_id == email_id)
    }

    fn position(&self, email_id: &str) -> Option<usize> {
        self.emails.iter().position(|email| email.email_id == email_id)
    }

    pub fn selected(&self) -> Option<&Email> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    /// Select an email and mark it read
    pub fn select(&mut self, email_id: &str) -> Option<Email> {
        let email = self.get_mut(email_id)?;
        email.unread = false;
        let email = email.clone();
        self.selected = Some(email.email_id.clone());
        Some(email)
    }

    pub fn mark_unread(&mut self) -> Option<ActionResult> {
        let selected = self.selected.clone()?;
        let email = self.get_mut(&selected)?;
        email.unread = true;
        Some(ActionResult {
            email_subject: email.subject.clone(),
            action: InboxAction::MarkUnread,
            message: format!("Email \"{}\" was marked as unread.", email.subject),
            reply_text: None,
            pending: None,
        })
    }

    /// Advance the selection to the next email, wrapping at the end
    pub fn skip(&mut self) -> Option<ActionResult> {
        let current = self.selected().cloned()?;
        let index = self.position(&current.email_id)?;
        let next = (index + 1) % self.emails.len();
        self.selected = Some(self.emails[next].email_id.clone());
        Some(ActionResult {
            email_subject: current.subject.clone(),
            action: InboxAction::Skip,
            message: format!("Email \"{}\" was skipped.", current.subject),
            reply_text: None,
            pending: None,
        })
    }

    /// Remove an email; returns `None` when it is not (or no longer) present
    pub fn delete(&mut self, email_id: &str) -> Option<ActionResult> {
        let index = self.position(email_id)?;
        let removed = self.emails.remove(index);
        if self.selected.as_deref() == Some(email_id) {
            self.selected = self.emails.first().map(|email| email.email_id.clone());
        }
        debug!(email_id = %email_id, remaining = self.emails.len(), "Email deleted");
        Some(ActionResult {
            email_subject: removed.subject.clone(),
            action: InboxAction::Delete,
            message: format!("Email \"{}\" was deleted.", removed.subject),
            reply_text: None,
            pending: None,
        })
    }

    pub fn reply(&mut self, email_id: &str, text: &str) -> Option<ActionResult> {
        let email = self.get_mut(email_id)?;
        email.replied = true;
        email.last_reply = Some(text.to_string());
        Some(ActionResult {
            email_subject: email.subject.clone(),
            action: InboxAction::Reply,
            message: format!("Reply to \"{}\" was sent.", email.subject),
            reply_text: Some(text.to_string()),
            pending: None,
        })
    }

    pub fn suggested_reply(&self, email_id: &str) -> Option<String> {
        self.get(email_id).map(|email| {
            format!(
                "Thank you for your email regarding \"{}\". I've reviewed your message and will address your concerns promptly.",
                email.subject
            )
        })
    }

    /// Confirmation prompt for actions that need one (delete and reply)
    pub fn preview(&self, email_id: &str, action: InboxAction) -> Option<ActionResult> {
        let email = self.get(email_id)?;
        let (message, reply_text) = match action {
            InboxAction::Delete => (
                format!("Do you really want to delete \"{}\"?", email.subject),
                None,
            ),
            InboxAction::Reply => (
                format!("Do you want to reply to \"{}\"?", email.subject),
                self.suggested_reply(email_id),
            ),
            InboxAction::Skip | InboxAction::MarkUnread => return None,
        };
        Some(ActionResult {
            email_subject: email.subject.clone(),
            action,
            message,
            reply_text,
            pending: Some(true),
        })
    }
}
