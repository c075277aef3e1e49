use core_config::{ConfigError, FromEnv, env_optional, env_parse_or_default, env_required};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_TICKET_STATUS: &str = "solved";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Zendesk API configuration
#[derive(Clone)]
pub struct ZendeskConfig {
    pub subdomain: String,
    pub email: String,
    pub api_token: String,
    /// Only tickets with this status are indexed
    pub ticket_status: String,
    pub timeout: Duration,
    /// Overrides `https://{subdomain}.zendesk.com`, e.g. for a proxy
    pub base_url: Option<String>,
}

impl ZendeskConfig {
    pub fn new(
        subdomain: impl Into<String>,
        email: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            subdomain: subdomain.into(),
            email: email.into(),
            api_token: api_token.into(),
            ticket_status: DEFAULT_TICKET_STATUS.to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            base_url: None,
        }
    }

    pub fn with_ticket_status(mut self, status: impl Into<String>) -> Self {
        self.ticket_status = status.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn site_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.zendesk.com", self.subdomain),
        }
    }

    /// `https://{subdomain}.zendesk.com/api/v2`
    pub fn api_base_url(&self) -> String {
        format!("{}/api/v2", self.site_url())
    }

    /// Prefix of the agent-facing ticket links stored as chunk URLs
    pub fn ticket_base_url(&self) -> String {
        format!("{}/agent/tickets", self.site_url())
    }

    /// Basic auth user for API token authentication
    pub fn auth_user(&self) -> String {
        format!("{}/token", self.email)
    }
}

// Keep the token out of logs
impl fmt::Debug for ZendeskConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZendeskConfig")
            .field("subdomain", &self.subdomain)
            .field("email", &self.email)
            .field("api_token", &"***")
            .field("ticket_status", &self.ticket_status)
            .field("timeout", &self.timeout)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl FromEnv for ZendeskConfig {
    /// Load from `ZENDESK_SUBDOMAIN`, `ZENDESK_EMAIL`, `ZENDESK_API_TOKEN`,
    /// `ZENDESK_TICKET_STATUS`, `ZENDESK_BASE_URL` and `HTTP_TIMEOUT_SECS`
    fn from_env() -> Result<Self, ConfigError> {
        let subdomain = env_required("ZENDESK_SUBDOMAIN")?;
        if subdomain.contains('.') || subdomain.contains('/') {
            return Err(ConfigError::parse(
                "ZENDESK_SUBDOMAIN",
                format!("'{}' must be a bare subdomain, not a host or URL", subdomain),
            ));
        }

        let timeout_secs = env_parse_or_default("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;

        Ok(Self {
            subdomain: subdomain.trim().to_string(),
            email: env_required("ZENDESK_EMAIL")?,
            api_token: env_required("ZENDESK_API_TOKEN")?,
            ticket_status: env_optional("ZENDESK_TICKET_STATUS")
                .unwrap_or_else(|| DEFAULT_TICKET_STATUS.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            base_url: env_optional("ZENDESK_BASE_URL"),
        })
    }
}
