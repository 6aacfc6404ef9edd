//! Transport to the Mailin endpoint.
//!
//! # Design
//! The facade owns every decision about *what* to send; a `Transport` only
//! delivers a normalized `Query` and hands back the raw response body. The
//! Mailin service takes every action as a form-encoded POST to a single URL,
//! which `HttpTransport` implements on top of `ureq`. Tests and embedders
//! can substitute any other implementation (an in-memory fake, a proxy, a
//! recorded session) through the same one-method trait.

use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::query::Query;

/// Delivers one normalized query and returns the raw response body.
pub trait Transport {
    fn send(&self, query: &Query) -> Result<String>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, query: &Query) -> Result<String> {
        (**self).send(query)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, query: &Query) -> Result<String> {
        (**self).send(query)
    }
}

/// Form-encoded POST to the Mailin endpoint.
///
/// Non-2xx statuses are reported as `ApiError::Http` rather than returned as
/// bodies, so a proxy error page is never mistaken for a service response.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self {
            agent,
            endpoint: endpoint.to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.endpoint, config.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn send(&self, query: &Query) -> Result<String> {
        let form = query
            .pairs()
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()));

        let mut response = self
            .agent
            .post(&self.endpoint)
            .send_form(form)
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(ApiError::Http { status, body });
        }
        Ok(body)
    }
}
