//! SAML 1.1 ticket validation (`samlValidate`).
//!
//! The ticket is posted inside a SOAP-wrapped `samlp:Request`. Its
//! `IssueInstant` is taken from the CAS server's own clock, read from the
//! `Date` header of a preliminary GET request, so that servers with a
//! strict clock-skew window accept it.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use regex::Regex;
use reqwest::header;
use roxmltree::{Document, Node};

use super::{
    CasError,
    attributes::{Attributes, MergePolicy},
    endpoint::CasEndpointConfig,
    response::{FailureReason, ValidationResult, text_of},
    validator::{TicketValidator, ValidatedTicket},
};

/// Status values differ between servers (`samlp:Success`, `saml1p:Success`, ...).
static SUCCESS_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"saml1?p?:Success").expect("SAML status pattern is valid")
});

/// How far ahead of the server clock the request is stamped.
const ISSUE_INSTANT_LEAD_SECS: i64 = 10;

/// SAML 1.1 `samlValidate` client.
#[derive(Debug, Clone)]
pub struct SamlTicketValidator {
    endpoint: Arc<CasEndpointConfig>,
    http_client: reqwest::Client,
    merge_policy: MergePolicy,
}

impl SamlTicketValidator {
    pub fn new(
        endpoint: Arc<CasEndpointConfig>,
        http_client: reqwest::Client,
        merge_policy: MergePolicy,
    ) -> Self {
        Self {
            endpoint,
            http_client,
            merge_policy,
        }
    }

    /// The CAS server's current time, read from a response `Date` header.
    async fn server_time(&self) -> Option<DateTime<Utc>> {
        let url = self.endpoint.clock_probe_url().ok()?;
        let response = match self.http_client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "CAS clock probe failed; using local time");
                return None;
            }
        };

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            tracing::debug!(status = %status, "CAS clock probe returned unexpected status");
            return None;
        }

        let date = response.headers().get(header::DATE)?.to_str().ok()?;
        match DateTime::parse_from_rfc2822(date) {
            Ok(time) => Some(time.with_timezone(&Utc)),
            Err(e) => {
                tracing::debug!(error = %e, date, "Unparseable Date header from CAS server");
                None
            }
        }
    }
}

#[async_trait]
impl TicketValidator for SamlTicketValidator {
    async fn validate(&self, service: &str, ticket: &str) -> Result<ValidatedTicket, CasError> {
        let url = self.endpoint.saml_validate_url(service)?;

        let now = self.server_time().await.unwrap_or_else(Utc::now);
        let issue_instant = now + TimeDelta::seconds(ISSUE_INSTANT_LEAD_SECS);
        let request_id = format!("_{}", Utc::now().timestamp_millis());
        let envelope = build_request_envelope(ticket, &request_id, issue_instant);
        tracing::debug!(url = %url, request_id = %request_id, "Validating CAS ticket with SAML 1.1");

        let response = self
            .http_client
            .post(url)
            .header(header::CONTENT_TYPE, "text/xml")
            .header(header::ACCEPT, "*/*")
            .body(envelope)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, host = %self.endpoint.host(), "CAS SAML validation request failed");
                CasError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "CAS SAML endpoint returned non-success status");
        }

        let raw_body = response.text().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to read CAS SAML response");
            CasError::Transport(e)
        })?;
        tracing::debug!(body = %raw_body, "CAS SAML response");

        Ok(ValidatedTicket {
            result: parse_saml_response(&raw_body, self.merge_policy),
            raw_body,
        })
    }
}

/// SOAP envelope carrying a `samlp:Request` for `ticket`.
pub fn build_request_envelope(
    ticket: &str,
    request_id: &str,
    issue_instant: DateTime<Utc>,
) -> String {
    format!(
        concat!(
            r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">"#,
            r#"<SOAP-ENV:Header/><SOAP-ENV:Body>"#,
            r#"<samlp:Request xmlns:samlp="urn:oasis:names:tc:SAML:1.0:protocol" "#,
            r#"MajorVersion="1" MinorVersion="1" RequestID="{request_id}" IssueInstant="{issue_instant}">"#,
            r#"<samlp:AssertionArtifact>{ticket}</samlp:AssertionArtifact>"#,
            r#"</samlp:Request></SOAP-ENV:Body></SOAP-ENV:Envelope>"#,
        ),
        request_id = quick_xml::escape::escape(request_id),
        issue_instant = issue_instant.to_rfc3339_opts(SecondsFormat::Millis, true),
        ticket = quick_xml::escape::escape(ticket),
    )
}

fn first_descendant<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

/// Parse a SAML 1.1 validation response.
///
/// Element names are matched by local name, ignoring whatever prefix the
/// server chose. The `NameIdentifier` becomes the `user` attribute.
pub fn parse_saml_response(body: &str, policy: MergePolicy) -> ValidationResult {
    if body.trim().is_empty() {
        return ValidationResult::Failure(FailureReason::Malformed(
            "empty response body".to_string(),
        ));
    }
    let doc = match Document::parse(body) {
        Ok(doc) => doc,
        Err(e) => return ValidationResult::Failure(FailureReason::Malformed(e.to_string())),
    };
    let root = doc.root_element();

    let Some(status) = first_descendant(root, "StatusCode") else {
        return ValidationResult::Failure(FailureReason::NoSuccessElement);
    };
    let status_value = status.attribute("Value").unwrap_or_default();
    if !SUCCESS_STATUS.is_match(status_value) {
        return ValidationResult::Failure(FailureReason::Rejected {
            code: status_value.to_string(),
            description: first_descendant(root, "StatusMessage")
                .map(|n| text_of(n).trim().to_string())
                .unwrap_or_default(),
        });
    }

    let mut attributes = Attributes::new();
    let statements: Vec<_> = root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "AttributeStatement")
        .collect();

    if let Some(name_id) = statements
        .iter()
        .find_map(|statement| first_descendant(*statement, "NameIdentifier"))
    {
        attributes.insert("user", text_of(name_id));
    }

    for attribute in statements.iter().flat_map(|statement| {
        statement
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "Attribute")
    }) {
        let Some(name) = attribute.attribute("AttributeName") else {
            continue;
        };
        let mut values = attribute
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "AttributeValue")
            .map(text_of);

        match policy {
            MergePolicy::Combine => {
                for value in values {
                    attributes.add_scalar(name, value, policy);
                }
            }
            MergePolicy::LastWins => {
                if let Some(value) = values.next() {
                    attributes.insert(name, value);
                }
            }
        }
    }

    ValidationResult::Success(attributes)
}
