//! Executing requests against the CRM.
//!
//! # Design
//! The resource clients never perform I/O. `Transport` is the seam where a
//! request value becomes a network round-trip; `UreqTransport` is the
//! blocking implementation used by `Crm::from_config`. Tests can plug in
//! any other implementation (a closure-backed fake, a recorder, ...).
//!
//! Status codes are data, not errors: a transport only fails when no
//! response was received at all.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, CONTENT_TYPE_JSON};

pub const ENV_BASE_URL: &str = "AGILECRM_BASE_URL";
pub const ENV_DOMAIN: &str = "AGILECRM_DOMAIN";
pub const ENV_EMAIL: &str = "AGILECRM_EMAIL";
pub const ENV_API_KEY: &str = "AGILECRM_API_KEY";

/// Performs one HTTP round-trip.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request)
    }
}

/// Where the CRM lives and how to authenticate against it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct CrmConfig {
    pub base_url: String,
    pub email: String,
    pub api_key: String,
}

impl CrmConfig {
    /// Hosted CRM account at `https://{domain}.agilecrm.com/dev/api`.
    pub fn for_domain(domain: &str, email: &str, api_key: &str) -> Self {
        Self {
            base_url: format!("https://{domain}.agilecrm.com/dev/api"),
            email: email.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `AGILECRM_BASE_URL` wins over `AGILECRM_DOMAIN` when both are set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let require = |key: &str| lookup(key).ok_or_else(|| ApiError::Config(format!("{key} is not set")));
        let email = require(ENV_EMAIL)?;
        let api_key = require(ENV_API_KEY)?;
        match (lookup(ENV_BASE_URL), lookup(ENV_DOMAIN)) {
            (Some(base_url), _) => Ok(Self {
                base_url,
                email,
                api_key,
            }),
            (None, Some(domain)) => Ok(Self::for_domain(&domain, &email, &api_key)),
            (None, None) => Err(ApiError::Config(format!(
                "neither {ENV_BASE_URL} nor {ENV_DOMAIN} is set"
            ))),
        }
    }

    /// Value of the `authorization` header for HTTP basic auth.
    pub fn authorization(&self) -> String {
        let credentials = STANDARD.encode(format!("{}:{}", self.email, self.api_key));
        format!("Basic {credentials}")
    }
}

impl fmt::Debug for CrmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrmConfig")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Blocking transport backed by a `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
    authorization: Option<String>,
}

impl UreqTransport {
    /// No `authorization` header; useful against local fakes.
    pub fn anonymous() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            agent,
            authorization: None,
        }
    }

    pub fn new(config: &CrmConfig) -> Self {
        Self {
            authorization: Some(config.authorization()),
            ..Self::anonymous()
        }
    }

    fn decorate<B>(&self, mut builder: ureq::RequestBuilder<B>, request: &HttpRequest) -> ureq::RequestBuilder<B> {
        builder = builder.header("accept", CONTENT_TYPE_JSON);
        if let Some(authorization) = &self.authorization {
            builder = builder.header("authorization", authorization.as_str());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("authenticated", &self.authorization.is_some())
            .finish()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let body = request.body.as_deref().unwrap_or_default().as_bytes();
        let result = match request.method {
            HttpMethod::Get => self.decorate(self.agent.get(&request.path), request).call(),
            HttpMethod::Delete => self.decorate(self.agent.delete(&request.path), request).call(),
            HttpMethod::Post => self.decorate(self.agent.post(&request.path), request).send(body),
            HttpMethod::Put => self.decorate(self.agent.put(&request.path), request).send(body),
        };
        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }
}
