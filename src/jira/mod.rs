pub mod types;

pub use types::Ticket;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::JiraConfig;
use crate::http::{self, RemoteError, Service};

/// Ticket-tracker operations used by the pipeline.
#[async_trait]
pub trait TicketTracker: Send + Sync {
    /// Confirm the configured credentials are accepted.
    async fn verify_identity(&self) -> Result<(), RemoteError>;

    async fn fetch_ticket(&self, ticket_id: &str) -> Result<Ticket, RemoteError>;
}

/// `TicketTracker` backed by the Jira REST API v2 with basic auth.
pub struct JiraClient {
    client: reqwest::Client,
    config: JiraConfig,
}

impl JiraClient {
    pub fn new(client: reqwest::Client, config: JiraConfig) -> Self {
        Self { client, config }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}/rest/api/2/{}", self.config.host, path))
            .basic_auth(&self.config.user, Some(&self.config.password))
            .header(reqwest::header::ACCEPT, "application/json")
    }
}

#[async_trait]
impl TicketTracker for JiraClient {
    #[instrument(skip(self), fields(host = %self.config.host, user = %self.config.user))]
    async fn verify_identity(&self) -> Result<(), RemoteError> {
        let identity = http::send_json(Service::Jira, self.get("myself"), "the current user").await?;
        debug!(
            account = identity.get("name").and_then(|v| v.as_str()).unwrap_or("unknown"),
            "Jira credentials accepted"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_ticket(&self, ticket_id: &str) -> Result<Ticket, RemoteError> {
        let resource = format!("issue {}", ticket_id);
        let issue = http::send_json(Service::Jira, self.get(&format!("issue/{}", ticket_id)), &resource).await?;
        let ticket = Ticket::from_json(ticket_id, &issue, &self.config.pull_request_field);
        debug!(
            key = %ticket.key,
            release_version = ticket.release_version.as_deref().unwrap_or(""),
            has_pull_requests = !ticket.pull_requests.is_empty(),
            "fetched Jira ticket"
        );
        Ok(ticket)
    }
}
