//! Ticket validation over HTTP.
//!
//! [`TicketValidator`] is the seam between the strategy and the CAS server.
//! [`ServiceTicketValidator`] speaks the CAS 2.0/3.0 `serviceValidate`
//! protocol; the SAML 1.1 flavour lives in [`super::saml`].

use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Certificate, header};

use super::{
    CasError,
    attributes::MergePolicy,
    endpoint::CasEndpointConfig,
    response::{ValidationResult, parse_service_response},
};
use crate::config::CasConfig;

const USER_AGENT: &str = concat!("cas-sso/", env!("CARGO_PKG_VERSION"));

/// A parsed validation response together with the body it came from.
#[derive(Debug, Clone)]
pub struct ValidatedTicket {
    pub result: ValidationResult,
    /// Raw response body, handed to the raw-info hook.
    pub raw_body: String,
}

/// Confirms a service ticket with the CAS server.
///
/// Implementations perform exactly one validation exchange per call and
/// never retry. Transport failures are returned as [`CasError::Transport`];
/// everything the server answers, including HTTP error statuses, is parsed
/// into a [`ValidationResult`].
#[async_trait]
pub trait TicketValidator: Send + Sync {
    async fn validate(&self, service: &str, ticket: &str) -> Result<ValidatedTicket, CasError>;
}

/// CAS 2.0/3.0 `serviceValidate` client.
#[derive(Debug, Clone)]
pub struct ServiceTicketValidator {
    endpoint: Arc<CasEndpointConfig>,
    http_client: reqwest::Client,
    merge_policy: MergePolicy,
}

impl ServiceTicketValidator {
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
}

#[async_trait]
impl TicketValidator for ServiceTicketValidator {
    async fn validate(&self, service: &str, ticket: &str) -> Result<ValidatedTicket, CasError> {
        let url = self.endpoint.service_validate_url(service, ticket)?;
        tracing::debug!(url = %url, "Validating CAS service ticket");

        let response = self
            .http_client
            .get(url.clone())
            .header(header::ACCEPT, "*/*")
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, host = %self.endpoint.host(), "CAS ticket validation request failed");
                CasError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "CAS validation endpoint returned non-success status");
        }

        let raw_body = response.text().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to read CAS validation response");
            CasError::Transport(e)
        })?;
        tracing::debug!(body = %raw_body, "CAS validation response");

        Ok(ValidatedTicket {
            result: parse_service_response(&raw_body, self.merge_policy),
            raw_body,
        })
    }
}

/// Build the HTTP client used for every request to the CAS server.
///
/// Applies timeouts, TLS verification, extra trust roots from `ca_path` and
/// the `ssl_version` pin. Redirects are never followed: a validation
/// endpoint that redirects is answering with something other than a
/// validation response.
pub fn build_http_client(config: &CasConfig) -> Result<reqwest::Client, CasError> {
    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(USER_AGENT);

    if config.disable_ssl_verification {
        tracing::warn!("TLS certificate verification is disabled for the CAS server");
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(ca_path) = &config.ca_path {
        for certificate in load_ca_certificates(Path::new(ca_path))? {
            builder = builder.add_root_certificate(certificate);
        }
    }

    if let Some(version) = &config.ssl_version {
        let version = parse_tls_version(version)?;
        builder = builder.min_tls_version(version).max_tls_version(version);
    }

    builder
        .build()
        .map_err(|e| CasError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Read PEM certificates from a bundle file or from every `.pem`, `.crt`
/// and `.cer` file in a directory.
pub fn load_ca_certificates(path: &Path) -> Result<Vec<Certificate>, CasError> {
    let files = if path.is_dir() {
        let entries = std::fs::read_dir(path).map_err(|e| {
            CasError::Configuration(format!("cannot read ca_path '{}': {e}", path.display()))
        })?;
        let mut files: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| matches!(ext, "pem" | "crt" | "cer"))
            })
            .collect();
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut certificates = Vec::new();
    for file in files {
        let pem = std::fs::read(&file).map_err(|e| {
            CasError::Configuration(format!("cannot read CA file '{}': {e}", file.display()))
        })?;
        let bundle = Certificate::from_pem_bundle(&pem).map_err(|e| {
            CasError::Configuration(format!("invalid PEM in '{}': {e}", file.display()))
        })?;
        certificates.extend(bundle);
    }

    if certificates.is_empty() {
        return Err(CasError::Configuration(format!(
            "no certificates found in ca_path '{}'",
            path.display()
        )));
    }

    tracing::debug!(count = certificates.len(), path = %path.display(), "Loaded CA certificates");
    Ok(certificates)
}

/// Map an `ssl_version` option to a TLS protocol version.
pub fn parse_tls_version(value: &str) -> Result<reqwest::tls::Version, CasError> {
    match value.to_ascii_lowercase().replace(['.', '_', 'v'], "").as_str() {
        "tls12" => Ok(reqwest::tls::Version::TLS_1_2),
        "tls13" => Ok(reqwest::tls::Version::TLS_1_3),
        _ => Err(CasError::Configuration(format!(
            "unsupported ssl_version '{value}' (expected TLSv1_2 or TLSv1_3)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header as header_matcher, method, path, query_param},
    };

    use super::*;
    use crate::cas::{attributes::AttributeValue, response::FailureReason};

    const SUCCESS: &str = include_str!("../../tests/fixtures/cas/cas_success.xml");

    fn validator(server: &MockServer, policy: MergePolicy) -> ServiceTicketValidator {
        let endpoint = CasEndpointConfig::from_config(&CasConfig::for_url(server.uri())).unwrap();
        let client = build_http_client(&CasConfig::default()).unwrap();
        ServiceTicketValidator::new(Arc::new(endpoint), client, policy)
    }

    #[tokio::test]
    async fn test_validate_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/serviceValidate"))
            .and(query_param("ticket", "ST-1"))
            .and(query_param("service", "http://app/cb"))
            .and(header_matcher("accept", "*/*"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS))
            .expect(1)
            .mount(&server)
            .await;

        let validated = validator(&server, MergePolicy::Combine)
            .validate("http://app/cb", "ST-1")
            .await
            .unwrap();

        let ValidationResult::Success(attributes) = validated.result else {
            panic!("expected success");
        };
        assert_eq!(attributes.get_str("user"), Some("psegel"));
        assert!(matches!(attributes.get("roles"), Some(AttributeValue::List(r)) if r.len() == 3));
        assert_eq!(validated.raw_body, SUCCESS);
    }

    #[tokio::test]
    async fn test_error_status_body_is_still_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/serviceValidate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let validated = validator(&server, MergePolicy::LastWins)
            .validate("http://app/cb", "ST-1")
            .await
            .unwrap();
        assert_eq!(
            validated.result,
            ValidationResult::Failure(FailureReason::NoSuccessElement)
        );
    }

    #[tokio::test]
    async fn test_redirect_is_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/serviceValidate"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "http://elsewhere.invalid/"),
            )
            .mount(&server)
            .await;

        let validated = validator(&server, MergePolicy::LastWins)
            .validate("http://app/cb", "ST-1")
            .await
            .unwrap();
        assert!(matches!(
            validated.result,
            ValidationResult::Failure(FailureReason::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = CasEndpointConfig::from_config(&CasConfig {
            ssl: false,
            port: Some(port),
            ..CasConfig::for_host("127.0.0.1")
        })
        .unwrap();
        let validator = ServiceTicketValidator::new(
            Arc::new(endpoint),
            build_http_client(&CasConfig::default()).unwrap(),
            MergePolicy::LastWins,
        );

        let err = validator.validate("http://app/cb", "ST-1").await.unwrap_err();
        assert!(matches!(err, CasError::Transport(_)));
    }

    #[rstest]
    #[case("TLSv1_2", reqwest::tls::Version::TLS_1_2)]
    #[case("TLSv1.3", reqwest::tls::Version::TLS_1_3)]
    #[case("tlsv1_3", reqwest::tls::Version::TLS_1_3)]
    fn test_parse_tls_version(#[case] input: &str, #[case] expected: reqwest::tls::Version) {
        assert_eq!(parse_tls_version(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_tls_version_rejects_legacy() {
        assert!(parse_tls_version("SSLv3").is_err());
        assert!(parse_tls_version("TLSv1").is_err());
    }

    #[test]
    fn test_empty_ca_directory_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README"), "not a certificate").unwrap();

        let err = load_ca_certificates(dir.path()).unwrap_err();
        assert!(matches!(err, CasError::Configuration(msg) if msg.contains("no certificates")));
    }

    #[test]
    fn test_missing_ca_file_is_configuration_error() {
        let config = CasConfig {
            ca_path: Some("/nonexistent/cas-ca.pem".into()),
            ..CasConfig::for_host("cas.example.org")
        };
        assert!(matches!(
            build_http_client(&config),
            Err(CasError::Configuration(_))
        ));
    }
}
