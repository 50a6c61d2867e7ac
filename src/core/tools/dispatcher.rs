use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::{ToolErrorKind, ToolResult};
use super::registry::ToolRegistry;
use crate::core::mail::{EmailQuery, InboxMailProvider, MailError, MailProvider, SharedInbox};

/// Default number of results for `search_mails`
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Arguments as delivered by the model or an HTTP caller
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArguments {
    /// String-encoded JSON, parsed before dispatch
    Raw(String),
    Structured(Value),
}

impl From<String> for ToolArguments {
    fn from(raw: String) -> Self {
        ToolArguments::Raw(raw)
    }
}

impl From<&str> for ToolArguments {
    fn from(raw: &str) -> Self {
        ToolArguments::Raw(raw.to_string())
    }
}

impl From<Value> for ToolArguments {
    fn from(value: Value) -> Self {
        ToolArguments::Structured(value)
    }
}

impl ToolArguments {
    fn into_object(self) -> Result<Map<String, Value>, ToolResult> {
        let value = match self {
            ToolArguments::Raw(raw) if raw.trim().is_empty() => Value::Object(Map::new()),
            ToolArguments::Raw(raw) => serde_json::from_str(&raw).map_err(|e| {
                ToolResult::error(
                    ToolErrorKind::MalformedArguments,
                    format!("Arguments are not valid JSON: {e}"),
                )
            })?,
            ToolArguments::Structured(value) => value,
        };

        match value {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(ToolResult::error(
                ToolErrorKind::MalformedArguments,
                format!("Arguments must be a JSON object, got {other}"),
            )),
        }
    }
}

type HandlerResult = Result<Value, ToolResult>;

/// Executes tool calls against the inbox and the mail provider.
///
/// Calls are serialized: at most one handler runs at a time, so concurrent
/// callers can never interleave inbox mutations.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    inbox: SharedInbox,
    provider: Arc<dyn MailProvider>,
    serial: Mutex<()>,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        inbox: SharedInbox,
        provider: Arc<dyn MailProvider>,
    ) -> Self {
        Self {
            registry,
            inbox,
            provider,
            serial: Mutex::new(()),
        }
    }

    /// Email tools over `inbox`, searched through an [`InboxMailProvider`].
    pub fn for_inbox(inbox: SharedInbox) -> Self {
        let provider = Arc::new(InboxMailProvider::new(inbox.clone()));
        Self::new(Arc::new(ToolRegistry::email_tools()), inbox, provider)
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn inbox(&self) -> &SharedInbox {
        &self.inbox
    }

    /// Run one tool call. Never fails: every problem becomes an error result.
    pub async fn dispatch(&self, name: &str, arguments: impl Into<ToolArguments>) -> ToolResult {
        let Some(definition) = self.registry.get(name) else {
            warn!(tool = %name, "Rejected call to unknown tool");
            return ToolResult::unknown_tool(name);
        };

        let args = match arguments.into().into_object() {
            Ok(args) => args,
            Err(result) => {
                warn!(tool = %name, "Rejected tool call with malformed arguments");
                return result;
            }
        };

        for required in definition.required_params() {
            if args.get(required).is_none_or(Value::is_null) {
                return ToolResult::error(
                    ToolErrorKind::MalformedArguments,
                    format!("Missing required argument '{required}' for {name}"),
                );
            }
        }

        let _serial = self.serial.lock().await;
        info!(tool = %name, "Dispatching tool call");

        let outcome = match name {
            "get_emails" => self.get_emails(&args),
            "read_email" => self.read_email(&args),
            "send_reply" => self.send_reply(&args),
            "delete_email" => self.delete_email(&args),
            "search_mails" => self.search_mails(&args).await,
            "read_mail" => self.read_mail(&args).await,
            _ => Err(ToolResult::unknown_tool(name)),
        };

        match outcome {
            Ok(value) => {
                debug!(tool = %name, "Tool call succeeded");
                ToolResult::Success(value)
            }
            Err(result) => {
                if let ToolResult::Error { kind, message } = &result {
                    warn!(tool = %name, kind = %kind, "Tool call failed: {}", message);
                }
                result
            }
        }
    }

    fn get_emails(&self, args: &Map<String, Value>) -> HandlerResult {
        let limit = usize_arg(args, "limit")?.unwrap_or(DEFAULT_MAX_RESULTS);
        let query = EmailQuery::parse(optional_str_arg(args, "filter")?.unwrap_or_default());

        let inbox = self.inbox.read();
        let emails: Vec<_> = inbox
            .emails()
            .iter()
            .filter(|email| query.matches(email))
            .take(limit)
            .cloned()
            .collect();

        Ok(json!({
            "count": emails.len(),
            "emails": emails,
        }))
    }

    fn read_email(&self, args: &Map<String, Value>) -> HandlerResult {
        let email_id = str_arg(args, "email_id")?;
        let inbox = self.inbox.read();
        let email = inbox.get(email_id).ok_or_else(|| not_found(email_id))?;
        Ok(json!({ "email": email }))
    }

    fn send_reply(&self, args: &Map<String, Value>) -> HandlerResult {
        let email_id = str_arg(args, "email_id")?;
        let message = str_arg(args, "message")?;

        let result = self
            .inbox
            .write()
            .reply(email_id, message)
            .ok_or_else(|| not_found(email_id))?;

        Ok(json!({
            "email_id": email_id,
            "status": "sent",
            "subject": result.email_subject,
            "message": result.message,
        }))
    }

    fn delete_email(&self, args: &Map<String, Value>) -> HandlerResult {
        let email_id = str_arg(args, "email_id")?;
        let mut inbox = self.inbox.write();
        let result = inbox.delete(email_id).ok_or_else(|| not_found(email_id))?;

        Ok(json!({
            "email_id": email_id,
            "deleted": true,
            "subject": result.email_subject,
            "remaining": inbox.len(),
        }))
    }

    async fn search_mails(&self, args: &Map<String, Value>) -> HandlerResult {
        let query = str_arg(args, "query")?;
        let max_results = usize_arg(args, "max_results")?.unwrap_or(DEFAULT_MAX_RESULTS);

        let result = self
            .provider
            .search_emails(query, max_results)
            .await
            .map_err(mail_error)?;

        Ok(json!({
            "count": result.emails.len(),
            "total_estimate": result.result_size_estimate,
            "emails": result.emails,
        }))
    }

    async fn read_mail(&self, args: &Map<String, Value>) -> HandlerResult {
        let message_id = str_arg(args, "message_id")?;
        let email = self
            .provider
            .get_email_details(message_id)
            .await
            .map_err(mail_error)?;
        Ok(json!({ "email": email }))
    }
}

fn not_found(email_id: &str) -> ToolResult {
    ToolResult::error(
        ToolErrorKind::NotFound,
        format!("Email '{email_id}' not found"),
    )
}

fn mail_error(err: MailError) -> ToolResult {
    match err {
        MailError::NotFound(id) => not_found(&id),
        MailError::Provider(message) => ToolResult::error(ToolErrorKind::ProviderError, message),
    }
}

fn str_arg<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str, ToolResult> {
    optional_str_arg(args, key)?.ok_or_else(|| {
        ToolResult::error(
            ToolErrorKind::MalformedArguments,
            format!("Missing required argument '{key}'"),
        )
    })
}

fn optional_str_arg<'a>(
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>, ToolResult> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(other) => Err(ToolResult::error(
            ToolErrorKind::MalformedArguments,
            format!("Argument '{key}' must be a string, got {other}"),
        )),
    }
}

/// Accepts a non-negative integer or a numeric string
fn usize_arg(args: &Map<String, Value>, key: &str) -> Result<Option<usize>, ToolResult> {
    let invalid = |value: &Value| {
        ToolResult::error(
            ToolErrorKind::MalformedArguments,
            format!("Argument '{key}' must be a non-negative integer, got {value}"),
        )
    };

    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Number(number)) => number
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| invalid(value)),
        Some(value @ Value::String(text)) => text
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| invalid(value)),
        Some(other) => Err(invalid(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mail::{EmailDetails, Inbox, MailResult, SearchResult};
    use async_trait::async_trait;

    fn dispatcher() -> ToolDispatcher {
        ToolDispatcher::for_inbox(Inbox::with_mock_data().into_shared())
    }

    struct FailingProvider;

    #[async_trait]
    impl MailProvider for FailingProvider {
        async fn search_emails(&self, _query: &str, _max: usize) -> MailResult<SearchResult> {
            Err(MailError::Provider("quota exceeded".to_string()))
        }

        async fn get_email_details(&self, _id: &str) -> MailResult<EmailDetails> {
            Err(MailError::Provider("token expired".to_string()))
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_never_panics() {
        let dispatcher = dispatcher();
        for name in ["", "launch_rockets", "SEARCH_MAILS", "read_mail "] {
            let result = dispatcher.dispatch(name, "{}").await;
            assert_eq!(result.error_kind(), Some(ToolErrorKind::UnknownTool));
        }
        let result = dispatcher.dispatch("archive_email", "{}").await;
        assert!(result.to_json()["error"].as_str().unwrap().contains("archive_email"));
    }

    #[tokio::test]
    async fn test_malformed_arguments_skip_execution() {
        let dispatcher = dispatcher();
        let result = dispatcher.dispatch("delete_email", r#"{"email_id": "1""#).await;
        assert_eq!(result.error_kind(), Some(ToolErrorKind::MalformedArguments));
        assert_eq!(dispatcher.inbox().read().len(), 5);

        let result = dispatcher.dispatch("delete_email", "[1, 2]").await;
        assert_eq!(result.error_kind(), Some(ToolErrorKind::MalformedArguments));

        let result = dispatcher.dispatch("send_reply", r#"{"email_id": "1"}"#).await;
        assert_eq!(result.error_kind(), Some(ToolErrorKind::MalformedArguments));
        assert!(!dispatcher.inbox().read().get("1").unwrap().replied);
    }

    #[tokio::test]
    async fn test_search_unread_scenario() {
        let dispatcher = dispatcher();
        let result = dispatcher
            .dispatch("search_mails", r#"{"query":"is:unread","max_results":3}"#)
            .await;

        let payload = result.to_json();
        assert!(result.is_success());
        assert_eq!(payload["count"], 2);
        assert_eq!(payload["total_estimate"], 2);
        let ids: Vec<_> = payload["emails"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["2", "4"]);
    }

    #[tokio::test]
    async fn test_search_count_is_min_of_max_results_and_matches() {
        let dispatcher = dispatcher();
        for max in 0..7usize {
            let payload = dispatcher
                .dispatch("search_mails", json!({"query": "inbox", "max_results": max}))
                .await
                .to_json();
            assert_eq!(payload["count"], max.min(5));
            assert_eq!(payload["total_estimate"], 5);
        }

        let payload = dispatcher
            .dispatch("search_mails", json!({"query": ""}))
            .await
            .to_json();
        assert_eq!(payload["count"], 5);
    }

    #[tokio::test]
    async fn test_read_lookups_report_not_found() {
        let dispatcher = dispatcher();
        let result = dispatcher.dispatch("read_mail", r#"{"message_id":"77"}"#).await;
        assert_eq!(result.error_kind(), Some(ToolErrorKind::NotFound));
        let result = dispatcher.dispatch("read_email", r#"{"email_id":"77"}"#).await;
        assert_eq!(result.error_kind(), Some(ToolErrorKind::NotFound));

        let payload = dispatcher
            .dispatch("read_mail", r#"{"message_id":"3"}"#)
            .await
            .to_json();
        assert_eq!(payload["email"]["headers"]["subject"], "Meeting Rescheduled");
    }

    #[tokio::test]
    async fn test_delete_twice_is_safe() {
        let dispatcher = dispatcher();
        let first = dispatcher.dispatch("delete_email", r#"{"email_id":"2"}"#).await;
        assert!(first.is_success());
        assert_eq!(first.to_json()["remaining"], 4);

        let second = dispatcher.dispatch("delete_email", r#"{"email_id":"2"}"#).await;
        assert_eq!(second.error_kind(), Some(ToolErrorKind::NotFound));
        assert_eq!(dispatcher.inbox().read().len(), 4);
    }

    #[tokio::test]
    async fn test_send_reply_marks_replied() {
        let dispatcher = dispatcher();
        let result = dispatcher
            .dispatch(
                "send_reply",
                json!({"email_id": "4", "message": "Thanks, it works now."}),
            )
            .await;
        assert_eq!(result.to_json()["status"], "sent");

        let inbox = dispatcher.inbox().read();
        let email = inbox.get("4").unwrap();
        assert!(email.replied);
        assert_eq!(email.last_reply.as_deref(), Some("Thanks, it works now."));
    }

    #[tokio::test]
    async fn test_get_emails_preserves_order_and_filters() {
        let dispatcher = dispatcher();
        let payload = dispatcher
            .dispatch("get_emails", r#"{"limit":"3"}"#)
            .await
            .to_json();
        let ids: Vec<_> = payload["emails"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["email_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);

        let payload = dispatcher
            .dispatch("get_emails", json!({"limit": 10, "filter": "unread"}))
            .await
            .to_json();
        assert_eq!(payload["count"], 2);

        let result = dispatcher.dispatch("get_emails", json!({"limit": -1})).await;
        assert_eq!(result.error_kind(), Some(ToolErrorKind::MalformedArguments));
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_error_result() {
        let inbox = Inbox::with_mock_data().into_shared();
        let dispatcher = ToolDispatcher::new(
            Arc::new(ToolRegistry::email_tools()),
            inbox,
            Arc::new(FailingProvider),
        );

        let result = dispatcher.dispatch("search_mails", json!({"query": "x"})).await;
        assert_eq!(result.error_kind(), Some(ToolErrorKind::ProviderError));
        assert_eq!(result.to_json()["error"], "quota exceeded");

        let result = dispatcher.dispatch("read_mail", json!({"message_id": "1"})).await;
        assert_eq!(result.error_kind(), Some(ToolErrorKind::ProviderError));
    }

    #[tokio::test]
    async fn test_concurrent_deletes_remove_each_email_once() {
        let dispatcher = Arc::new(dispatcher());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let dispatcher = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                dispatcher
                    .dispatch("delete_email", json!({"email_id": "3"}))
                    .await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_success() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(dispatcher.inbox().read().len(), 4);
    }
}
