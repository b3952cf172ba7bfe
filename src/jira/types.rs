use serde_json::Value;

/// The parts of a Jira issue the generator needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ticket {
    /// Issue key (e.g., "ABC-123")
    pub key: String,
    /// `fields.versions[0].name`, if the ticket has a fix/affects version
    pub release_version: Option<String>,
    /// Raw content of the pull request custom field; empty when unset
    pub pull_requests: String,
}

impl Ticket {
    /// Extract a ticket from the issue payload. `pull_request_field` is the
    /// custom field id, which may hold a string or a list of strings.
    pub fn from_json(key: &str, issue: &Value, pull_request_field: &str) -> Self {
        let fields = issue.get("fields");

        let release_version = fields
            .and_then(|f| f.pointer("/versions/0/name"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let pull_requests = match fields.and_then(|f| f.get(pull_request_field)) {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        };

        Ticket {
            key: issue
                .get("key")
                .and_then(Value::as_str)
                .unwrap_or(key)
                .to_string(),
            release_version,
            pull_requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ticket_from_full_payload() {
        let issue = json!({
            "key": "ABC-123",
            "fields": {
                "versions": [{ "name": "2.4.7" }, { "name": "2.5.0" }],
                "customfield_12345": "https://github.com/acme/shop/pull/12"
            }
        });
        let ticket = Ticket::from_json("abc-123", &issue, "customfield_12345");
        assert_eq!(ticket.key, "ABC-123");
        assert_eq!(ticket.release_version.as_deref(), Some("2.4.7"));
        assert_eq!(ticket.pull_requests, "https://github.com/acme/shop/pull/12");
    }

    #[test]
    fn test_ticket_with_list_field() {
        let issue = json!({
            "fields": {
                "customfield_1": ["https://github.com/a/b/pull/1", "https://github.com/a/b/pull/2"]
            }
        });
        let ticket = Ticket::from_json("ABC-1", &issue, "customfield_1");
        assert_eq!(ticket.key, "ABC-1");
        assert_eq!(
            ticket.pull_requests,
            "https://github.com/a/b/pull/1\nhttps://github.com/a/b/pull/2"
        );
    }

    #[test]
    fn test_ticket_without_version_or_prs() {
        let issue = json!({ "fields": { "versions": [], "customfield_1": null } });
        let ticket = Ticket::from_json("ABC-1", &issue, "customfield_1");
        assert_eq!(ticket.release_version, None);
        assert!(ticket.pull_requests.is_empty());
    }
}
