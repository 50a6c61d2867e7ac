use std::sync::LazyLock;

use regex::Regex;

use super::Email;

/// `field:value` operator, e.g. `from:alex` or `is:unread`
static OPERATOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<field>is|in|from|to|subject):(?P<value>.+)$")
        .expect("operator pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Unread,
    Read,
    Inbox,
    From(String),
    To(String),
    Subject(String),
    Text(String),
}

/// Parsed mail search query.
///
/// Matching is case-insensitive and every term must match (AND). Plain words
/// are substring-matched against subject, sender, summary and content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailQuery {
    terms: Vec<Term>,
}

impl EmailQuery {
    pub fn parse(query: &str) -> Self {
        let terms = query
            .split_whitespace()
            .map(|raw| {
                let token = raw.to_lowercase();
                if let Some(caps) = OPERATOR_PATTERN.captures(&token) {
                    let value = caps["value"].to_string();
                    return match &caps["field"] {
                        "is" if value == "unread" => Term::Unread,
                        "is" if value == "read" => Term::Read,
                        "in" if value == "inbox" => Term::Inbox,
                        "from" => Term::From(value),
                        "to" => Term::To(value),
                        "subject" => Term::Subject(value),
                        _ => Term::Text(token),
                    };
                }
                // Only `is:read` filters on read mails; a bare "read" is text
                match token.as_str() {
                    "unread" => Term::Unread,
                    "inbox" => Term::Inbox,
                    _ => Term::Text(token),
                }
            })
            .collect();

        Self { terms }
    }

    /// True when no term can exclude an email
    pub fn is_unrestricted(&self) -> bool {
        self.terms.iter().all(|term| matches!(term, Term::Inbox))
    }

    pub fn matches(&self, email: &Email) -> bool {
        self.terms.iter().all(|term| match term {
            Term::Unread => email.unread,
            Term::Read => !email.unread,
            Term::Inbox => true,
            Term::From(value) => email.sender.to_lowercase().contains(value),
            Term::To(value) => email
                .recipients
                .iter()
                .any(|recipient| recipient.to_lowercase().contains(value)),
            Term::Subject(value) => email.subject.to_lowercase().contains(value),
            Term::Text(value) => [
                &email.subject,
                &email.sender,
                &email.summary,
                &email.email_content,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(value)),
        })
    }
}
