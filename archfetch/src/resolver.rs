//! Relocation lookup against the PMC Open Access web service.
//!
//! The service answers `GET <service_url><archive id>` with a small XML
//! document. A record carrying a `tgz` link gives the archive's current
//! location; an `error` element means the archive is gone for good.

use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;

use crate::traits::{Resolution, ResolverService};

/// Default lookup endpoint; the archive id is appended.
pub const DEFAULT_SERVICE_URL: &str =
    "https://www.ncbi.nlm.nih.gov/pmc/utils/oa/oa.fcgi?tool=archfetch&id=";

/// Result type for resolver operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors raised by the lookup itself (not by the archive being gone).
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The lookup request failed.
    #[error("resolver request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The response was not a document we understand.
    #[error("invalid resolver response: {0}")]
    Parse(String),
}

/// Resolver backed by the Open Access service.
#[derive(Debug)]
pub struct OaResolver {
    client: Client,
    service_url: String,
}

impl OaResolver {
    /// Create a resolver for `service_url` with the given request timeout.
    pub fn new(service_url: impl Into<String>, timeout: Duration) -> ResolveResult<Self> {
        let service_url = service_url.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolveError::Request {
                url: service_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            service_url,
        })
    }

    /// Base URL of the lookup service.
    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    fn fetch_record(&self, archive_id: &str) -> ResolveResult<String> {
        let url = format!("{}{}", self.service_url, archive_id);
        let request_error = |reason: String| ResolveError::Request {
            url: url.clone(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| request_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(request_error(format!("HTTP {}", response.status())));
        }

        response.text().map_err(|e| request_error(e.to_string()))
    }
}

impl ResolverService for OaResolver {
    fn resolve(&self, archive_id: &str, current_location: &str) -> ResolveResult<Resolution> {
        tracing::info!(archive_id, "Looking up current archive location");
        let body = self.fetch_record(archive_id)?;
        parse_oa_response(&body, current_location)
    }
}

/// Interpret an Open Access service response.
///
/// The first `<link format="tgz">` wins. Without one, any `<error>` element
/// marks the archive as permanently unavailable.
pub fn parse_oa_response(xml: &str, current_location: &str) -> ResolveResult<Resolution> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| ResolveError::Parse(e.to_string()))?;

    let link = doc
        .descendants()
        .filter(|n| n.has_tag_name("link"))
        .find(|n| n.attribute("format") == Some("tgz"))
        .and_then(|n| n.attribute("href"));

    if let Some(href) = link {
        return Ok(if href == current_location {
            Resolution::Unchanged
        } else {
            Resolution::NewLocation(href.to_string())
        });
    }

    let error_code = doc
        .descendants()
        .find(|n| n.has_tag_name("error"))
        .map(|n| n.attribute("code").unwrap_or_default());

    let reason = match error_code {
        Some("idIsNotOpenAccess") => "no longer open access".to_string(),
        Some("idDoesNotExist") => "no longer exists".to_string(),
        Some(code) => format!("service returned error code {}", code),
        None => "no archive link in response".to_string(),
    };

    Ok(Resolution::PermanentlyUnavailable(reason))
}
