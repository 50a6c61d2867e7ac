//! Mail data model, inbox state and the mail-provider boundary.
//!
//! The [`Inbox`] is the state container the UI reads and mutates: an ordered
//! list of emails plus the current selection. Tool handlers and the REST
//! inbox actions both operate on the same [`SharedInbox`].
//!
//! [`MailProvider`] is the boundary to a remote mail service (search and
//! detail lookups). [`InboxMailProvider`] serves it from the in-memory inbox.

pub mod credentials;
mod inbox;
mod provider;
mod query;

use serde::{Deserialize, Serialize};

pub use credentials::{CredentialVerification, verify_credentials};
pub use inbox::{ActionResult, Inbox, InboxAction, SharedInbox};
pub use provider::{InboxMailProvider, MailError, MailProvider, MailResult, SearchResult};
pub use query::EmailQuery;

/// Attachment metadata carried with an email (content is never downloaded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
}

/// One email as held in the inbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub email_id: String,
    pub sender: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    pub subject: String,
    #[serde(default)]
    pub email_content: String,
    /// ISO-8601 timestamp
    pub received_date: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub replied: bool,
    #[serde(rename = "lastReply", default, skip_serializing_if = "Option::is_none")]
    pub last_reply: Option<String>,
}

impl Email {
    /// Gmail-style label ids derived from the local flags
    pub fn label_ids(&self) -> Vec<String> {
        let mut labels = vec!["INBOX".to_string()];
        if self.unread {
            labels.push("UNREAD".to_string());
        }
        labels
    }

    pub fn to_summary(&self) -> EmailSummary {
        EmailSummary {
            id: self.email_id.clone(),
            thread_id: format!("thread-{}", self.email_id),
            subject: self.subject.clone(),
            from: self.sender.clone(),
            date: self.received_date.clone(),
            snippet: self.summary.clone(),
            label_ids: self.label_ids(),
        }
    }

    pub fn to_details(&self) -> EmailDetails {
        EmailDetails {
            id: self.email_id.clone(),
            thread_id: format!("thread-{}", self.email_id),
            label_ids: self.label_ids(),
            snippet: self.summary.clone(),
            history_id: self.email_id.clone(),
            internal_date: self.received_date.clone(),
            headers: EmailHeaders {
                subject: self.subject.clone(),
                from: self.sender.clone(),
                to: self.recipients.join(", "),
                date: self.received_date.clone(),
            },
            body: self.email_content.clone(),
            attachments: self
                .attachments
                .iter()
                .enumerate()
                .map(|(index, attachment)| AttachmentDetails {
                    id: format!("{}-att-{}", self.email_id, index),
                    filename: attachment.filename.clone(),
                    mime_type: attachment.mime_type.clone(),
                    size: 0,
                    part_id: (index + 1).to_string(),
                })
                .collect(),
        }
    }
}

/// Listing entry returned by a mail search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSummary {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub snippet: String,
    pub label_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailHeaders {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDetails {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub part_id: String,
}

/// Full message detail as returned by a provider lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDetails {
    pub id: String,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    pub history_id: String,
    pub internal_date: String,
    pub headers: EmailHeaders,
    pub body: String,
    pub attachments: Vec<AttachmentDetails>,
}
