use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("patch-generator/", env!("CARGO_PKG_VERSION"));

/// Remote services the generator talks to. Used to shape error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Jira,
    GitHub,
}

impl Service {
    pub fn name(self) -> &'static str {
        match self {
            Service::Jira => "Jira",
            Service::GitHub => "GitHub",
        }
    }

    /// Configuration keys to check when the service rejects credentials.
    fn credentials(self) -> &'static str {
        match self {
            Service::Jira => "JIRA_USER and JIRA_PASS",
            Service::GitHub => "GIT_TOKEN",
        }
    }

    fn transport_hint(self) -> &'static str {
        match self {
            Service::Jira => " (is the Jira host reachable? Is your VPN on?)",
            Service::GitHub => "",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{service} rejected the credentials (HTTP {status}); check {credentials} in your configuration")]
    Auth {
        service: Service,
        status: u16,
        credentials: &'static str,
    },

    #[error("{service} could not find {resource} (HTTP 404)")]
    NotFound { service: Service, resource: String },

    #[error("{service} request failed: {source}{hint}")]
    Transport {
        service: Service,
        #[source]
        source: reqwest::Error,
        hint: &'static str,
    },

    #[error("{service} returned HTTP {status} for {resource}{detail}")]
    Upstream {
        service: Service,
        status: u16,
        resource: String,
        detail: &'static str,
    },

    #[error("Failed to parse {service} response for {resource}: {source}")]
    Parse {
        service: Service,
        resource: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RemoteError {
    pub fn transport(service: Service, source: reqwest::Error) -> Self {
        RemoteError::Transport {
            service,
            source,
            hint: service.transport_hint(),
        }
    }

    pub fn empty_body(service: Service, status: StatusCode, resource: &str) -> Self {
        RemoteError::Upstream {
            service,
            status: status.as_u16(),
            resource: resource.to_string(),
            detail: " with an empty body",
        }
    }
}

/// Build the shared HTTP client with a bounded per-request timeout.
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Map a response status onto the error taxonomy. Only Jira distinguishes
/// "not found"; any other non-success status is an upstream failure.
pub fn check_status(service: Service, status: StatusCode, resource: &str) -> Result<(), RemoteError> {
    if status.is_success() {
        return Ok(());
    }

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Auth {
            service,
            status: status.as_u16(),
            credentials: service.credentials(),
        },
        StatusCode::NOT_FOUND if service == Service::Jira => RemoteError::NotFound {
            service,
            resource: resource.to_string(),
        },
        _ => RemoteError::Upstream {
            service,
            status: status.as_u16(),
            resource: resource.to_string(),
            detail: "",
        },
    })
}

/// Send a request and reject non-success responses.
pub async fn send(service: Service, request: RequestBuilder, resource: &str) -> Result<Response, RemoteError> {
    let response = request
        .send()
        .await
        .map_err(|e| RemoteError::transport(service, e))?;
    let status = response.status();
    debug!(service = %service, status = status.as_u16(), resource, "received response");
    check_status(service, status, resource)?;
    Ok(response)
}

/// Send a request and decode its body as JSON.
pub async fn send_json(
    service: Service,
    request: RequestBuilder,
    resource: &str,
) -> Result<serde_json::Value, RemoteError> {
    let response = send(service, request, resource).await?;
    let body = response
        .text()
        .await
        .map_err(|e| RemoteError::transport(service, e))?;
    serde_json::from_str(&body).map_err(|source| RemoteError::Parse {
        service,
        resource: resource.to_string(),
        source,
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_statuses_pass() {
        assert!(check_status(Service::Jira, StatusCode::OK, "issue ABC-1").is_ok());
        assert!(check_status(Service::GitHub, StatusCode::OK, "pull 1").is_ok());
    }

    #[test]
    fn test_unauthorized_names_credentials() {
        let err = check_status(Service::GitHub, StatusCode::UNAUTHORIZED, "pull 1").unwrap_err();
        assert!(matches!(err, RemoteError::Auth { status: 401, .. }));
        assert!(err.to_string().contains("GIT_TOKEN"));

        let err = check_status(Service::Jira, StatusCode::UNAUTHORIZED, "issue ABC-1").unwrap_err();
        assert!(err.to_string().contains("JIRA_USER and JIRA_PASS"));
    }

    #[test]
    fn test_not_found_only_for_jira() {
        let err = check_status(Service::Jira, StatusCode::NOT_FOUND, "issue ABC-1").unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
        assert_eq!(err.to_string(), "Jira could not find issue ABC-1 (HTTP 404)");

        let err = check_status(Service::GitHub, StatusCode::NOT_FOUND, "pull 1").unwrap_err();
        assert!(matches!(err, RemoteError::Upstream { status: 404, .. }));
    }

    #[test]
    fn test_other_statuses_are_upstream() {
        let err = check_status(Service::Jira, StatusCode::BAD_GATEWAY, "issue ABC-1").unwrap_err();
        assert_eq!(err.to_string(), "Jira returned HTTP 502 for issue ABC-1");
    }

    #[test]
    fn test_empty_body_message() {
        let err = RemoteError::empty_body(Service::GitHub, StatusCode::OK, "pull 1");
        assert_eq!(err.to_string(), "GitHub returned HTTP 200 for pull 1 with an empty body");
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(Duration::from_secs(5)).is_ok());
    }
}
