//! CAS server endpoints.
//!
//! [`CasEndpointConfig`] is the validated, immutable form of the `[cas]`
//! options. It is built once at startup and every login, logout and
//! validation URL is derived from it.

use url::Url;

use super::{CasError, url::append_params, url::remove_param};
use crate::config::CasConfig;

/// Validated CAS server location and endpoint paths.
///
/// Only [`CasEndpointConfig::from_config`] builds one, so the host and login
/// path are never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasEndpointConfig {
    ssl: bool,
    host: String,
    port: Option<u16>,
    /// Normalized path prefix: empty, or starting with `/` and without a trailing `/`.
    path: String,
    login_path: String,
    logout_path: String,
    service_validate_path: String,
    saml_validate_path: String,
}

impl CasEndpointConfig {
    /// Validate `config` and build the endpoint set.
    ///
    /// Fails with [`CasError::Configuration`] when neither a base URL nor a
    /// host is configured, or when the login path is empty.
    pub fn from_config(config: &CasConfig) -> Result<Self, CasError> {
        let (ssl, host, port, path) = match &config.url {
            Some(raw) => {
                if config.host.is_some() || config.port.is_some() || !config.path.is_empty() {
                    tracing::warn!(
                        url = %raw,
                        "CAS url is set; ignoring host, port and path options"
                    );
                }
                decompose_url(raw)?
            }
            None => (
                config.ssl,
                config.host.clone().unwrap_or_default(),
                config.port,
                config.path.clone(),
            ),
        };

        let host = host.trim().to_string();
        if host.is_empty() || config.login_url.trim().is_empty() {
            return Err(CasError::Configuration(
                "host and login_url must be provided".to_string(),
            ));
        }
        if host.contains(['/', '?', '#', '@', ' ']) {
            return Err(CasError::Configuration(format!(
                "host '{host}' is not a valid host name"
            )));
        }

        let endpoint = Self {
            ssl,
            host,
            port,
            path: normalize_path(&path),
            login_path: normalize_endpoint(&config.login_url),
            logout_path: normalize_endpoint(&config.logout_url),
            service_validate_path: normalize_endpoint(&config.service_validate_url),
            saml_validate_path: normalize_endpoint(&config.saml_validate_url),
        };

        // Building the base URL once proves every derived URL will parse.
        Url::parse(&endpoint.base_url()).map_err(|e| {
            CasError::Configuration(format!("CAS base URL is invalid: {e}"))
        })?;

        Ok(endpoint)
    }

    pub fn ssl(&self) -> bool {
        self.ssl
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn scheme(&self) -> &'static str {
        if self.ssl { "https" } else { "http" }
    }

    /// `scheme://host[:port]path`, omitting the port when it is the scheme default.
    pub fn base_url(&self) -> String {
        let default_port = if self.ssl { 443 } else { 80 };
        match self.port {
            Some(port) if port != default_port => {
                format!("{}://{}:{}{}", self.scheme(), self.host, port, self.path)
            }
            _ => format!("{}://{}{}", self.scheme(), self.host, self.path),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Login URL that returns the user to `service` afterwards.
    pub fn login_url(&self, service: &str) -> Result<Url, CasError> {
        append_params(&self.endpoint(&self.login_path), &[("service", service)])
    }

    /// Logout URL, optionally pointing the user back at `service`.
    pub fn logout_url(&self, service: Option<&str>) -> Result<Url, CasError> {
        match service {
            Some(service) => {
                append_params(&self.endpoint(&self.logout_path), &[("service", service)])
            }
            None => append_params(&self.endpoint(&self.logout_path), &[]),
        }
    }

    /// Ticket validation URL.
    ///
    /// Any `ticket` parameter already on `service` is removed first so the
    /// request carries exactly one ticket.
    pub fn service_validate_url(&self, service: &str, ticket: &str) -> Result<Url, CasError> {
        let service = remove_param(service, "ticket")?;
        append_params(
            &self.endpoint(&self.service_validate_path),
            &[("service", service.as_str()), ("ticket", ticket)],
        )
    }

    /// SAML 1.1 validation URL; the ticket travels in the SOAP body.
    pub fn saml_validate_url(&self, service: &str) -> Result<Url, CasError> {
        let service = remove_param(service, "ticket")?;
        append_params(
            &self.endpoint(&self.saml_validate_path),
            &[("TARGET", service.as_str())],
        )
    }

    /// Lightweight URL used to read the CAS server's clock from its `Date` header.
    pub fn clock_probe_url(&self) -> Result<Url, CasError> {
        append_params(&self.endpoint(&self.login_path), &[])
    }
}

fn decompose_url(raw: &str) -> Result<(bool, String, Option<u16>, String), CasError> {
    let url = Url::parse(raw)
        .map_err(|e| CasError::Configuration(format!("CAS url '{raw}' is invalid: {e}")))?;

    let ssl = match url.scheme() {
        "https" => true,
        "http" => false,
        other => {
            return Err(CasError::Configuration(format!(
                "CAS url scheme must be http or https, got '{other}'"
            )));
        }
    };
    let host = url.host_str().unwrap_or_default().to_string();

    Ok((ssl, host, url.port(), url.path().to_string()))
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn normalize_endpoint(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
