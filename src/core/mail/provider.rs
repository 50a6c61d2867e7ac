use async_trait::async_trait;
use thiserror::Error;

use super::{EmailDetails, EmailQuery, EmailSummary, SharedInbox};

/// Errors reported by a mail provider
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("Email '{0}' not found")]
    NotFound(String),
    #[error("Mail provider error: {0}")]
    Provider(String),
}

pub type MailResult<T> = Result<T, MailError>;

/// Result of a provider-side search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub emails: Vec<EmailSummary>,
    /// Number of matches before truncation to `max_results`
    pub result_size_estimate: usize,
}

/// Remote mail service boundary. Both calls are fallible network operations.
#[async_trait]
pub trait MailProvider: Send + Sync {
    async fn search_emails(&self, query: &str, max_results: usize) -> MailResult<SearchResult>;

    async fn get_email_details(&self, message_id: &str) -> MailResult<EmailDetails>;
}

/// [`MailProvider`] backed by the shared in-memory inbox
#[derive(Clone)]
pub struct InboxMailProvider {
    inbox: SharedInbox,
}

impl InboxMailProvider {
    pub fn new(inbox: SharedInbox) -> Self {
        Self { inbox }
    }
}

#[async_trait]
impl MailProvider for InboxMailProvider {
    async fn search_emails(&self, query: &str, max_results: usize) -> MailResult<SearchResult> {
        let query = EmailQuery::parse(query);
        let inbox = self.inbox.read();
        let matches: Vec<_> = inbox
            .emails()
            .iter()
            .filter(|email| query.matches(email))
            .collect();

        Ok(SearchResult {
            result_size_estimate: matches.len(),
            emails: matches
                .into_iter()
                .take(max_results)
                .map(|email| email.to_summary())
                .collect(),
        })
    }

    async fn get_email_details(&self, message_id: &str) -> MailResult<EmailDetails> {
        self.inbox
            .read()
            .get(message_id)
            .map(|email| email.to_details())
            .ok_or_else(|| MailError::NotFound(message_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mail::Inbox;

    #[tokio::test]
    async fn test_search_reports_estimate_before_truncation() {
        let provider = InboxMailProvider::new(Inbox::with_mock_data().into_shared());
        let result = provider.search_emails("inbox", 2).await.unwrap();
        assert_eq!(result.emails.len(), 2);
        assert_eq!(result.result_size_estimate, 5);
        assert_eq!(result.emails[0].id, "1");
        assert_eq!(result.emails[1].id, "2");
    }

    #[tokio::test]
    async fn test_details_lookup_miss_is_not_found() {
        let provider = InboxMailProvider::new(Inbox::with_mock_data().into_shared());
        let err = provider.get_email_details("999").await.unwrap_err();
        assert_eq!(err, MailError::NotFound("999".to_string()));

        let details = provider.get_email_details("4").await.unwrap();
        assert_eq!(details.headers.subject, "Your Recent Support Ticket #45678");
        assert!(details.label_ids.contains(&"UNREAD".to_string()));
    }

    #[tokio::test]
    async fn test_search_sees_inbox_mutations() {
        let inbox = Inbox::with_mock_data().into_shared();
        let provider = InboxMailProvider::new(inbox.clone());
        inbox.write().delete("2");

        let result = provider.search_emails("is:unread", 10).await.unwrap();
        assert_eq!(result.result_size_estimate, 1);
        assert_eq!(result.emails[0].id, "4");
    }
}
